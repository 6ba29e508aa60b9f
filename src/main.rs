use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use gorefactor::config::{self, Config, ConfigError};
use gorefactor::ops::{self, AnyOperation, Context, Operation, Scope};
use gorefactor::plan::{
    apply, render_diff, render_preview, validate_plan, ApplySummary, BatchComposer, Issue,
    PersistError, Plan, PlanDocument, Severity,
};
use gorefactor::workspace::{load, LoadError, SymbolId, Workspace};
use gorefactor::{IssueKind, RefactorError, ReferenceIndex};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_VALIDATION: u8 = 1;
const EXIT_EXECUTION: u8 = 2;
const EXIT_FILESYSTEM: u8 = 3;

#[derive(Parser)]
#[command(name = "gorefactor")]
#[command(about = "Plan, validate and apply structured refactorings across Go workspaces", long_about = None)]
#[command(version)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Config file (defaults to <workspace>/.gorefactor.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    flags: PlanFlags,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct PlanFlags {
    /// Preview the plan without writing anything
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Show a unified diff of the plan
    #[arg(short, long, global = true)]
    diff: bool,

    /// Abort a batch on its first failing step
    #[arg(long, global = true, overrides_with = "no_atomic")]
    atomic: bool,

    /// Keep composing a batch past failing steps
    #[arg(long, global = true, overrides_with = "atomic")]
    no_atomic: bool,

    /// Report validation errors as warnings and apply anyway
    #[arg(long, global = true)]
    allow_breaking: bool,

    /// Persist the request as a plan document
    #[arg(long, global = true, value_name = "FILE")]
    save_plan: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rename a top-level symbol and every reference to it
    RenameSymbol {
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        new_name: String,
        #[arg(long, default_value_t = Scope::Package)]
        scope: Scope,
    },

    /// Rename a method of a concrete type
    RenameMethod {
        #[arg(long)]
        package: Option<String>,
        #[arg(long = "type")]
        type_name: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        new_name: String,
        /// Also rename the method on interfaces the type satisfies
        #[arg(long)]
        update_implementations: bool,
    },

    /// Rename an interface method and the methods implementing it
    RenameInterfaceMethod {
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        interface: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        new_name: String,
    },

    /// Rename a package clause and its importers' qualifiers
    RenamePackage {
        #[arg(long)]
        package: String,
        #[arg(long)]
        new_name: String,
        /// Leave importing files untouched
        #[arg(long)]
        no_update_imports: bool,
    },

    /// Move a top-level symbol to another package
    MoveSymbol {
        #[arg(long)]
        symbol: String,
        #[arg(long = "from")]
        from_package: String,
        #[arg(long = "to")]
        to_package: String,
        /// Create the target package when it does not exist
        #[arg(long)]
        create_target: bool,
    },

    /// Move a package to another directory
    MovePackage {
        #[arg(long)]
        package: String,
        #[arg(long = "to")]
        to_dir: String,
        #[arg(long)]
        new_name: Option<String>,
    },

    /// Move every package under a directory
    MoveDirectory {
        #[arg(long = "from")]
        from_dir: String,
        #[arg(long = "to")]
        to_dir: String,
    },

    /// Extract a line range into a new function
    ExtractFunction {
        #[arg(long)]
        file: String,
        #[arg(long)]
        start_line: usize,
        #[arg(long)]
        end_line: usize,
        #[arg(long)]
        name: String,
    },

    /// Extract a line range of a method into a new method on the same receiver
    ExtractMethod {
        #[arg(long)]
        file: String,
        #[arg(long)]
        start_line: usize,
        #[arg(long)]
        end_line: usize,
        #[arg(long)]
        name: String,
    },

    /// Declare an interface from a type's method set
    ExtractInterface {
        #[arg(long)]
        package: String,
        #[arg(long = "type")]
        type_name: String,
        /// Methods to include (default: every exported method)
        #[arg(long, value_delimiter = ',')]
        methods: Vec<String>,
        #[arg(long = "name")]
        interface_name: String,
        #[arg(long)]
        target_package: Option<String>,
    },

    /// Bind an expression to a new local variable
    ExtractVariable {
        #[arg(long)]
        file: String,
        #[arg(long)]
        line: usize,
        #[arg(long)]
        start_col: usize,
        /// Exclusive end column
        #[arg(long)]
        end_col: usize,
        #[arg(long)]
        name: String,
    },

    /// Replace a literal value with a new package-level constant
    ExtractConstant {
        #[arg(long)]
        package: String,
        #[arg(long)]
        literal: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = Scope::Package)]
        scope: Scope,
        /// File receiving the declaration
        #[arg(long)]
        file: Option<String>,
    },

    /// Replace calls of a function with its body
    InlineFunction {
        #[arg(long)]
        package: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        keep_declaration: bool,
    },

    /// Replace calls of a method with its body
    InlineMethod {
        #[arg(long)]
        package: Option<String>,
        #[arg(long = "type")]
        type_name: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        keep_declaration: bool,
    },

    /// Replace uses of a variable with its initializer
    InlineVariable {
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        line: Option<usize>,
    },

    /// Replace uses of a constant with its value
    InlineConstant {
        #[arg(long)]
        package: String,
        #[arg(long)]
        name: String,
    },

    /// Change a function's parameters or results and update its callers
    ChangeSignature {
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        name: String,
        /// New parameter, e.g. "ctx context.Context" (repeatable, in order)
        #[arg(long = "param")]
        new_params: Vec<String>,
        /// New result type (repeatable, in order)
        #[arg(long = "return")]
        new_returns: Vec<String>,
        #[arg(long, default_value_t = Scope::Workspace)]
        scope: Scope,
        #[arg(long)]
        propagate_to_interface: bool,
        /// Argument passed by callers for an added parameter
        #[arg(long)]
        default_value: Option<String>,
        #[arg(long)]
        new_param_position: Option<usize>,
        #[arg(long)]
        removed_param_index: Option<usize>,
        #[arg(long)]
        new_return_position: Option<usize>,
        #[arg(long)]
        removed_return_index: Option<usize>,
        #[arg(long)]
        default_return_value: Option<String>,
    },

    /// Drop import aliases equal to the package's own name
    CleanAliases {
        #[arg(long)]
        package: Option<String>,
    },

    /// Make every importer of a path use the same alias
    StandardizeAliases {
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        import_path: Option<String>,
        #[arg(long)]
        alias: Option<String>,
    },

    /// Alias imports whose local names collide within a file
    ResolveAliasConflicts {
        #[arg(long)]
        package: Option<String>,
    },

    /// Give imports short derived aliases
    ConvertToAliases {
        #[arg(long)]
        package: Option<String>,
        #[arg(long)]
        import_path: Option<String>,
        /// Alias length (default from config)
        #[arg(long)]
        length: Option<usize>,
    },

    /// Write a package re-exporting symbols of other packages
    CreateFacade {
        #[arg(long)]
        package: String,
        #[arg(long = "source", value_delimiter = ',', required = true)]
        sources: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        #[arg(long)]
        file_name: Option<String>,
    },

    /// Write one facade per source package under a directory
    GenerateFacades {
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<String>,
        #[arg(long)]
        output_dir: String,
        #[arg(long)]
        file_name: Option<String>,
    },

    /// Regenerate an existing facade file
    UpdateFacade {
        #[arg(long)]
        package: String,
        #[arg(long)]
        file_name: Option<String>,
        /// Add symbols exported since the facade was written
        #[arg(long)]
        add_new: bool,
    },

    /// Report coupling and cycles, and suggest symbol moves
    MoveByDependencies {
        #[arg(long)]
        package: Option<String>,
        /// Plan the suggested moves
        #[arg(long)]
        apply: bool,
    },

    /// Execute a persisted plan document
    Batch {
        #[arg(long = "plan", value_name = "FILE")]
        plan: PathBuf,
    },

    /// List the references of a symbol
    References {
        /// Symbol name, or Type.Member for methods and fields
        symbol: String,
        #[arg(long)]
        package: Option<String>,
        /// Include the declaration itself
        #[arg(long)]
        with_definition: bool,
    },
}

enum Request {
    /// Operations to plan; `dry_run` is set by a plan document that was
    /// saved as a dry run.
    Operations {
        ops: Vec<AnyOperation>,
        dry_run: bool,
    },
    References {
        symbol: String,
        package: Option<String>,
        with_definition: bool,
    },
}

impl Commands {
    /// Turn the parsed command into operations, filling unset knobs from
    /// the config.
    fn into_request(self, config: &Config) -> Result<Request> {
        let facade_file = |name: Option<String>| name.or_else(|| Some(config.facade.file_name.clone()));
        let op: AnyOperation = match self {
            Commands::RenameSymbol {
                package,
                symbol,
                new_name,
                scope,
            } => ops::RenameSymbol {
                package,
                name: symbol,
                new_name,
                scope,
            }
            .into(),
            Commands::RenameMethod {
                package,
                type_name,
                method,
                new_name,
                update_implementations,
            } => ops::RenameMethod {
                package,
                type_name,
                method,
                new_name,
                update_implementations,
            }
            .into(),
            Commands::RenameInterfaceMethod {
                package,
                interface,
                method,
                new_name,
            } => ops::RenameInterfaceMethod {
                package,
                interface,
                method,
                new_name,
            }
            .into(),
            Commands::RenamePackage {
                package,
                new_name,
                no_update_imports,
            } => ops::RenamePackage {
                package,
                new_name,
                update_imports: !no_update_imports,
            }
            .into(),
            Commands::MoveSymbol {
                symbol,
                from_package,
                to_package,
                create_target,
            } => ops::MoveSymbol {
                symbol,
                from_package,
                to_package,
                create_target,
            }
            .into(),
            Commands::MovePackage {
                package,
                to_dir,
                new_name,
            } => ops::MovePackage {
                package,
                to_dir,
                new_name,
            }
            .into(),
            Commands::MoveDirectory { from_dir, to_dir } => {
                ops::MoveDirectory { from_dir, to_dir }.into()
            }
            Commands::ExtractFunction {
                file,
                start_line,
                end_line,
                name,
            } => ops::ExtractFunction {
                file,
                start_line,
                end_line,
                name,
            }
            .into(),
            Commands::ExtractMethod {
                file,
                start_line,
                end_line,
                name,
            } => ops::ExtractMethod {
                file,
                start_line,
                end_line,
                name,
            }
            .into(),
            Commands::ExtractInterface {
                package,
                type_name,
                methods,
                interface_name,
                target_package,
            } => ops::ExtractInterface {
                package,
                type_name,
                methods,
                interface_name,
                target_package,
            }
            .into(),
            Commands::ExtractVariable {
                file,
                line,
                start_col,
                end_col,
                name,
            } => ops::ExtractVariable {
                file,
                line,
                start_col,
                end_col,
                name,
            }
            .into(),
            Commands::ExtractConstant {
                package,
                literal,
                name,
                scope,
                file,
            } => ops::ExtractConstant {
                package,
                literal,
                name,
                scope,
                file,
            }
            .into(),
            Commands::InlineFunction {
                package,
                name,
                keep_declaration,
            } => ops::InlineFunction {
                package,
                name,
                keep_declaration,
            }
            .into(),
            Commands::InlineMethod {
                package,
                type_name,
                method,
                keep_declaration,
            } => ops::InlineMethod {
                package,
                type_name,
                method,
                keep_declaration,
            }
            .into(),
            Commands::InlineVariable {
                package,
                name,
                file,
                line,
            } => ops::InlineVariable {
                package,
                name,
                file,
                line,
            }
            .into(),
            Commands::InlineConstant { package, name } => {
                ops::InlineConstant { package, name }.into()
            }
            Commands::ChangeSignature {
                package,
                name,
                new_params,
                new_returns,
                scope,
                propagate_to_interface,
                default_value,
                new_param_position,
                removed_param_index,
                new_return_position,
                removed_return_index,
                default_return_value,
            } => ops::ChangeSignature {
                package,
                name,
                new_params,
                new_returns,
                scope,
                propagate_to_interface,
                default_value,
                new_param_position,
                removed_param_index,
                new_return_position,
                removed_return_index,
                default_return_value,
            }
            .into(),
            Commands::CleanAliases { package } => ops::CleanAliases { package }.into(),
            Commands::StandardizeAliases {
                package,
                import_path,
                alias,
            } => ops::StandardizeAliases {
                package,
                import_path,
                alias,
            }
            .into(),
            Commands::ResolveAliasConflicts { package } => {
                ops::ResolveAliasConflicts { package }.into()
            }
            Commands::ConvertToAliases {
                package,
                import_path,
                length,
            } => ops::ConvertToAliases {
                package,
                import_path,
                length: length.unwrap_or(config.aliases.length),
            }
            .into(),
            Commands::CreateFacade {
                package,
                sources,
                symbols,
                file_name,
            } => ops::CreateFacade {
                package,
                sources,
                symbols,
                file_name: facade_file(file_name),
            }
            .into(),
            Commands::GenerateFacades {
                sources,
                output_dir,
                file_name,
            } => ops::GenerateFacades {
                sources,
                output_dir,
                file_name: facade_file(file_name),
            }
            .into(),
            Commands::UpdateFacade {
                package,
                file_name,
                add_new,
            } => ops::UpdateFacade {
                package,
                file_name: facade_file(file_name),
                add_new,
            }
            .into(),
            Commands::MoveByDependencies { package, apply } => {
                ops::MoveByDependencies { package, apply }.into()
            }
            Commands::Batch { plan } => {
                let doc = PlanDocument::load(&plan)?;
                debug!(
                    created_at = %doc.created_at,
                    workspace = %doc.workspace.display(),
                    "executing plan document"
                );
                return Ok(Request::Operations {
                    ops: doc.operations()?,
                    dry_run: doc.dry_run,
                });
            }
            Commands::References {
                symbol,
                package,
                with_definition,
            } => {
                return Ok(Request::References {
                    symbol,
                    package,
                    with_definition,
                })
            }
        };
        Ok(Request::Operations {
            ops: vec![op],
            dry_run: false,
        })
    }
}

/// Effective planner settings: CLI flags over config over defaults.
struct Settings {
    dry_run: bool,
    diff: bool,
    atomic: bool,
    allow_breaking: bool,
}

impl Settings {
    fn new(flags: &PlanFlags, config: &Config) -> Self {
        let atomic = if flags.atomic {
            true
        } else if flags.no_atomic {
            false
        } else {
            config.planner.atomic
        };
        Self {
            dry_run: flags.dry_run,
            diff: flags.diff,
            atomic,
            allow_breaking: flags.allow_breaking || config.planner.allow_breaking,
        }
    }
}

/// Which phase a refactoring error came from; decides the exit code.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Planning,
    Execution,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let root = resolve_workspace(cli.workspace)?;
    let config = config::load_for_workspace(&root, cli.config.as_deref())?;
    init_tracing(&config.log.level, cli.verbose);

    let mut settings = Settings::new(&cli.flags, &config);
    let request = cli.command.into_request(&config)?;

    let ws = load(&root, &config.load_options())
        .with_context(|| format!("failed to load workspace {}", root.display()))?;
    info!(
        root = %root.display(),
        packages = ws.packages().len(),
        files = ws.files().len(),
        "workspace loaded"
    );

    match request {
        Request::References {
            symbol,
            package,
            with_definition,
        } => Ok(cmd_references(&ws, &symbol, package.as_deref(), with_definition)),
        Request::Operations { ops, dry_run } => {
            settings.dry_run |= dry_run;
            if let Some(path) = &cli.flags.save_plan {
                let doc = PlanDocument::from_operations(&root, &ops, settings.dry_run)?;
                doc.save(path)?;
                println!(
                    "{}",
                    format!("Plan saved to {} ({} step(s))", path.display(), ops.len()).dimmed()
                );
            }
            cmd_plan(&ws, &ops, &settings)
        }
    }
}

fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    let path = match cli_workspace {
        Some(path) => path,
        None => env::current_dir().context("failed to read the current directory")?,
    };
    path.canonicalize()
        .with_context(|| format!("workspace {} is not accessible", path.display()))
}

/// stderr subscriber: RUST_LOG wins, then `-v`, then the configured level.
fn init_tracing(level: &str, verbose: bool) {
    let fallback = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_plan(ws: &Workspace, ops: &[AnyOperation], settings: &Settings) -> Result<ExitCode> {
    let index = ReferenceIndex::build(ws);
    let mut plan = match ops {
        [op] => {
            let cx = Context::new(ws, &index);
            if let Err(err) = op.validate(&cx) {
                return Ok(fail(Stage::Planning, &err));
            }
            match op.execute(&cx) {
                Ok(plan) => plan,
                Err(err) => return Ok(fail(Stage::Planning, &err)),
            }
        }
        _ => {
            let composed = BatchComposer::new(ws)
                .atomic(settings.atomic)
                .with_index(&index)
                .compose(ops);
            match composed {
                Ok(plan) => plan,
                Err(err) => return Ok(fail(Stage::Planning, &err)),
            }
        }
    };
    // Failed steps of a non-atomic batch are already reported; they must
    // not block the steps that succeeded.
    if ops.len() > 1 && !settings.atomic {
        plan.downgrade_errors();
    }

    let report = validate_plan(&plan, ws, settings.allow_breaking);
    let show_preview = settings.dry_run || plan.is_empty();
    let shown = if show_preview {
        print!("{}", render_preview(&plan, ws));
        plan.issues().len()
    } else {
        println!(
            "Planned {} change(s) in {} file(s)",
            plan.changes.len(),
            plan.affected_files.len()
        );
        0
    };
    for issue in report.issues.iter().skip(shown) {
        print_issue(issue);
    }

    if settings.diff {
        match render_diff(&plan, ws) {
            Ok(diff) => display_diff(&diff),
            Err(err) => return Ok(fail(Stage::Execution, &err)),
        }
    }

    if !report.is_ok() {
        eprintln!(
            "{} plan has {} error(s); nothing written (use --allow-breaking to override)",
            "✗".red(),
            report.errors().count()
        );
        return Ok(ExitCode::from(EXIT_VALIDATION));
    }
    if settings.dry_run {
        println!("{}", "[DRY RUN - nothing written]".cyan());
        return Ok(ExitCode::SUCCESS);
    }
    if plan.is_empty() {
        println!("{}", "Nothing to apply".dimmed());
        return Ok(partial_outcome(&plan));
    }

    match apply(&plan, ws) {
        Ok(summary) => print_summary(&summary),
        Err(err) => return Ok(fail(Stage::Execution, &err)),
    }
    Ok(partial_outcome(&plan))
}

/// Exit code of a plan whose successful parts were written.
fn partial_outcome(plan: &Plan) -> ExitCode {
    match &plan.error {
        Some(err) => {
            warn!(error = %err, "batch completed with failed steps");
            eprintln!("{} some steps failed: {err}", "✗".red());
            ExitCode::from(EXIT_EXECUTION)
        }
        None => ExitCode::SUCCESS,
    }
}

fn cmd_references(
    ws: &Workspace,
    symbol: &str,
    package: Option<&str>,
    with_definition: bool,
) -> ExitCode {
    let index = ReferenceIndex::build(ws);
    let id = match resolve_symbol(&Context::new(ws, &index), symbol, package) {
        Ok(id) => id,
        Err(err) => return fail(Stage::Planning, &err),
    };
    let refs: Vec<_> = index
        .references(id)
        .into_iter()
        .filter(|r| with_definition || !r.is_definition)
        .collect();

    for r in &refs {
        let tag = if r.is_definition {
            "definition".bold()
        } else if r.ambiguous {
            "ambiguous".yellow()
        } else {
            "reference".normal()
        };
        println!("{}:{}:{}  {tag}", r.path.display(), r.line, r.column);
    }
    let ambiguous = refs.iter().filter(|r| r.ambiguous).count();
    println!();
    println!(
        "{} reference(s) to {}{}",
        format!("{}", refs.len()).green(),
        ws.symbol(id).qualified_name(),
        if ambiguous > 0 {
            format!(", {} matched by name only", ambiguous.to_string().yellow())
        } else {
            String::new()
        }
    );
    ExitCode::SUCCESS
}

/// `Name` or `Type.Member`, in `package` or unique across the workspace.
fn resolve_symbol(
    cx: &Context<'_>,
    symbol: &str,
    package: Option<&str>,
) -> Result<SymbolId, RefactorError> {
    let resolver = cx.resolver();
    match (symbol.split_once('.'), package) {
        (Some((ty, member)), Some(pkg)) => {
            let pkg = cx.package(pkg)?;
            resolver
                .resolve_method(pkg, ty, member)
                .or_else(|_| resolver.resolve_field(pkg, ty, member))
        }
        (Some((ty, member)), None) => resolver.resolve_method_anywhere(ty, member),
        (None, Some(pkg)) => resolver.resolve(cx.package(pkg)?, symbol),
        (None, None) => match resolver.resolve_everywhere(symbol).as_slice() {
            [single] => Ok(*single),
            [] => Err(RefactorError::not_found(symbol, "workspace", Vec::<String>::new())),
            many => Err(RefactorError::invalid(format!(
                "{symbol} is declared in {} packages; pass --package",
                many.len()
            ))),
        },
    }
}

fn fail(stage: Stage, err: &RefactorError) -> ExitCode {
    eprintln!("{} {err}", "error:".red().bold());
    if let Some(location) = err.location() {
        eprintln!("  at {location}");
    }
    let code = match (err.kind(), stage) {
        (IssueKind::FilesystemError, _) => EXIT_FILESYSTEM,
        (_, Stage::Planning) => EXIT_VALIDATION,
        (_, Stage::Execution) => EXIT_EXECUTION,
    };
    ExitCode::from(code)
}

/// Exit code for failures outside planning: config, plan documents and
/// workspace loading.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return match e {
                ConfigError::Io { .. } => EXIT_FILESYSTEM,
                _ => EXIT_VALIDATION,
            };
        }
        if let Some(e) = cause.downcast_ref::<PersistError>() {
            return match e {
                PersistError::Io { .. } => EXIT_FILESYSTEM,
                _ => EXIT_VALIDATION,
            };
        }
        if let Some(e) = cause.downcast_ref::<LoadError>() {
            return match e {
                LoadError::Parse(_) => EXIT_EXECUTION,
                _ => EXIT_FILESYSTEM,
            };
        }
        if cause.is::<std::io::Error>() {
            return EXIT_FILESYSTEM;
        }
    }
    EXIT_EXECUTION
}

fn print_issue(issue: &Issue) {
    let label = match issue.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".cyan(),
    };
    let location = match (&issue.file, issue.line) {
        (Some(file), Some(line)) => format!(" ({}:{line})", file.display()),
        (Some(file), None) => format!(" ({})", file.display()),
        _ => String::new(),
    };
    println!("{label}: {}: {}{}", issue.kind, issue.message, location.dimmed());
}

/// Colorize a unified diff.
fn display_diff(diff: &str) {
    for line in diff.lines() {
        let styled = if line.starts_with("+++") || line.starts_with("---") {
            line.dimmed()
        } else if line.starts_with("@@") {
            line.cyan()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else {
            line.normal()
        };
        println!("{styled}");
    }
}

fn print_summary(summary: &ApplySummary) {
    for path in &summary.edited {
        println!("{} edited {}", "✓".green(), path.display());
    }
    for path in &summary.unchanged {
        println!("{} {} already up to date", "⊙".yellow(), path.display());
    }
    for path in &summary.created {
        println!("{} created {}", "+".green(), path.display());
    }
    for (from, to) in &summary.moved {
        println!("{} moved {} → {}", "→".cyan(), from.display(), to.display());
    }
    for dir in &summary.removed_dirs {
        println!("{}", format!("  removed empty directory {}", display_path(dir)).dimmed());
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} change(s) applied", format!("{}", summary.changes).green());
    println!(
        "  {} file(s) touched",
        format!("{}", summary.files_touched()).green()
    );
}

fn display_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_string()
    } else {
        path.display().to_string()
    }
}
