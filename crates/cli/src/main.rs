//! Shopfloor CLI - production steps, schedules and worker progress.

mod logging;

use std::collections::HashMap;
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use shopfloor_core::{
    AssignmentChange, AssignmentId, AssignmentUpdate, DependencyId, DependencyType, EntryFilter,
    EntryId, NewScheduleEntry, NewStep, ProductId, StepCategory, StepId, StepUpdate, TaskStatus,
    Update, WorkerId,
};
use shopfloor_progress::{
    compute_efficiency, parse_clock, summarize_by_worker, EfficiencyInput, ProductionRecord,
};
use shopfloor_schedule::{BasicScheduleService, ScheduleService};
use shopfloor_storage::JsonStorage;

#[derive(Parser)]
#[command(name = "shopfloor")]
#[command(about = "Production step dependencies, schedules and worker progress", long_about = None)]
struct Cli {
    /// Data directory
    #[arg(long, global = true, default_value = ".shopfloor")]
    data_dir: PathBuf,

    /// Log filter, e.g. `debug` or `shopfloor_graph=trace` (overrides SHOPFLOOR_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Products
    #[command(subcommand)]
    Product(ProductCommand),
    /// Process steps
    #[command(subcommand)]
    Step(StepCommand),
    /// Step dependencies
    #[command(subcommand)]
    Deps(DepsCommand),
    /// Schedule entries
    #[command(subcommand)]
    Entry(EntryCommand),
    /// Worker membership on an entry
    #[command(subcommand)]
    Worker(WorkerCommand),
    /// Worker assignment progress
    #[command(subcommand)]
    Assignment(AssignmentCommand),
    /// Efficiency against standard time
    #[command(subcommand)]
    Efficiency(EfficiencyCommand),
}

#[derive(Subcommand)]
enum ProductCommand {
    /// Print a fresh product ID
    New,
}

#[derive(Subcommand)]
enum StepCommand {
    /// Add a step to a product
    Add(AddStepArgs),
    /// List a product's steps with dependencies
    List {
        /// Product ID
        #[arg(long)]
        product: ProductId,
    },
    /// Re-sequence or re-categorize an unscheduled step
    Update {
        /// Step ID
        id: StepId,
        /// New sequence number
        #[arg(long)]
        sequence: Option<u32>,
        /// New category
        #[arg(long)]
        category: Option<StepCategory>,
    },
}

#[derive(Args)]
struct AddStepArgs {
    /// Product ID
    #[arg(long)]
    product: ProductId,
    /// Display name
    #[arg(long)]
    name: String,
    /// Standard seconds per piece
    #[arg(long = "time")]
    time_per_piece: u32,
    /// Shop code, e.g. CFA1
    #[arg(long)]
    code: Option<String>,
    /// Category (cutting, silkscreen, prep, sewing, inspection)
    #[arg(long)]
    category: Option<StepCategory>,
    /// Sequence number
    #[arg(long, default_value = "0")]
    sequence: u32,
    /// Required equipment code
    #[arg(long)]
    equipment: Option<String>,
    /// Required skill
    #[arg(long)]
    skill: Option<String>,
}

#[derive(Subcommand)]
enum DepsCommand {
    /// Add FROM -> TO
    Add {
        /// Predecessor step
        from: StepId,
        /// Dependent step
        to: StepId,
        /// start or finish
        #[arg(long = "type", default_value = "finish")]
        dep_type: DependencyType,
        /// Lag in seconds after the predecessor finishes
        #[arg(long, default_value = "0")]
        lag: u32,
    },
    /// Remove an edge
    Remove {
        /// Dependency ID
        id: DependencyId,
    },
    /// Replace a step's dependencies, e.g. "CFA1:finish,CTA1:start"
    Set {
        /// Step ID
        step: StepId,
        /// Dependency list in CODE[:type] notation
        notation: String,
    },
    /// Print a step's dependencies in CODE:type notation
    Show {
        /// Step ID
        step: StepId,
    },
    /// Change the lag or type of an edge
    Edit {
        /// Dependency ID
        id: DependencyId,
        /// New lag in seconds
        #[arg(long)]
        lag: Option<u32>,
        /// New type
        #[arg(long = "type")]
        dep_type: Option<DependencyType>,
    },
    /// Show the layered layout of a product
    Layers {
        /// Product ID
        #[arg(long)]
        product: ProductId,
    },
    /// Earliest start offsets for producing a quantity
    Timing {
        /// Product ID
        #[arg(long)]
        product: ProductId,
        /// Pieces to produce
        #[arg(long, default_value = "1")]
        quantity: u32,
    },
}

#[derive(Subcommand)]
enum EntryCommand {
    /// Register a scheduled step
    Add {
        /// Product ID
        #[arg(long)]
        product: ProductId,
        /// Step ID
        #[arg(long)]
        step: StepId,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: chrono::NaiveDate,
        /// Planned start (HH:MM)
        #[arg(long, value_parser = clock)]
        start: chrono::NaiveTime,
        /// Planned end (HH:MM)
        #[arg(long, value_parser = clock)]
        end: chrono::NaiveTime,
        /// Planned output in pieces
        #[arg(long)]
        output: u32,
        /// Order reference
        #[arg(long)]
        order: Option<String>,
    },
    /// Show an entry with assignments and analytics
    Show {
        /// Entry ID
        id: EntryId,
    },
    /// List entries
    List {
        /// Filter by product
        #[arg(long)]
        product: Option<ProductId>,
        /// Filter by step
        #[arg(long)]
        step: Option<StepId>,
        /// Filter by date
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        /// Filter by status
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Record progress on an entry without worker assignments
    Progress {
        /// Entry ID
        id: EntryId,
        /// New status
        #[arg(long)]
        status: TaskStatus,
        /// Cumulative output
        #[arg(long)]
        output: u32,
        /// Actual start (HH:MM)
        #[arg(long, value_parser = clock)]
        start: Option<chrono::NaiveTime>,
        /// Actual end (HH:MM)
        #[arg(long, value_parser = clock)]
        end: Option<chrono::NaiveTime>,
    },
}

#[derive(Subcommand)]
enum WorkerCommand {
    /// Assign a worker to an entry
    Add {
        /// Entry ID
        entry: EntryId,
        /// Worker name or ID
        worker: String,
    },
    /// Remove a not-started assignment
    Remove {
        /// Assignment ID
        id: AssignmentId,
    },
}

#[derive(Subcommand)]
enum AssignmentCommand {
    /// Start work
    Start {
        /// Assignment ID
        id: AssignmentId,
    },
    /// Report cumulative output and/or notes
    Output {
        /// Assignment ID
        id: AssignmentId,
        /// Cumulative output
        output: Option<u32>,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Finish work with the final output
    Complete {
        /// Assignment ID
        id: AssignmentId,
        /// Final cumulative output
        output: u32,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Output observations in time order
    History {
        /// Assignment ID
        id: AssignmentId,
    },
    /// Pace analytics
    Metrics {
        /// Assignment ID
        id: AssignmentId,
    },
}

#[derive(Subcommand)]
enum EfficiencyCommand {
    /// One clock window
    Window {
        /// Start (HH:MM)
        #[arg(long, value_parser = clock)]
        start: chrono::NaiveTime,
        /// End (HH:MM)
        #[arg(long, value_parser = clock)]
        end: chrono::NaiveTime,
        /// Pieces produced
        #[arg(long)]
        output: u32,
        /// Standard seconds per piece
        #[arg(long)]
        standard: u32,
    },
    /// Per-worker summary of a production history JSON file
    History {
        /// JSON array of production records
        file: PathBuf,
        /// Take standard times from this product's step codes
        #[arg(long)]
        product: Option<ProductId>,
        /// Standard time override, CODE=SECONDS (repeatable)
        #[arg(long = "standard", value_parser = standard_time)]
        standards: Vec<(String, u32)>,
    },
}

fn clock(text: &str) -> Result<chrono::NaiveTime, shopfloor_core::Error> {
    parse_clock(text)
}

fn standard_time(text: &str) -> Result<(String, u32), String> {
    let (code, secs) = text
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=SECONDS, got '{}'", text))?;
    let secs = secs
        .trim()
        .parse()
        .map_err(|_| format!("invalid seconds in '{}'", text))?;
    Ok((code.trim().to_string(), secs))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;

    let storage = JsonStorage::new(&cli.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", cli.data_dir.display()))?;
    debug!("Using data directory {}", storage.root().display());
    let service = BasicScheduleService::new(storage);

    match cli.command {
        Commands::Product(ProductCommand::New) => {
            println!("{}", ProductId::new());
        }
        Commands::Step(cmd) => run_step(&service, cmd).await?,
        Commands::Deps(cmd) => run_deps(&service, cmd).await?,
        Commands::Entry(cmd) => run_entry(&service, cmd).await?,
        Commands::Worker(cmd) => match cmd {
            WorkerCommand::Add { entry, worker } => {
                print_json(&service.add_worker(entry, WorkerId::new(worker)).await?)?;
            }
            WorkerCommand::Remove { id } => {
                print_json(&service.remove_worker(id).await?)?;
            }
        },
        Commands::Assignment(cmd) => run_assignment(&service, cmd).await?,
        Commands::Efficiency(cmd) => run_efficiency(&service, cmd).await?,
    }

    Ok(())
}

async fn run_step(service: &BasicScheduleService<JsonStorage>, cmd: StepCommand) -> Result<()> {
    match cmd {
        StepCommand::Add(args) => {
            let mut spec = NewStep::new(args.product, args.name, args.time_per_piece)
                .with_sequence(args.sequence);
            if let Some(code) = args.code {
                spec = spec.with_code(code);
            }
            if let Some(category) = args.category {
                spec = spec.with_category(category);
            }
            if let Some(equipment) = args.equipment {
                spec = spec.with_equipment(equipment);
            }
            if let Some(skill) = args.skill {
                spec = spec.with_required_skill(skill);
            }
            print_json(&service.dependencies().create_step(spec).await?)?;
        }
        StepCommand::List { product } => {
            print_json(&service.get_product_steps(product).await?)?;
        }
        StepCommand::Update { id, sequence, category } => {
            let mut changes = Vec::new();
            if let Some(sequence) = sequence {
                changes.push(StepUpdate::Resequence(sequence));
            }
            if let Some(category) = category {
                changes.push(StepUpdate::Recategorize(category));
            }
            if changes.is_empty() {
                bail!("nothing to update: pass --sequence and/or --category");
            }
            let mut last = None;
            for change in changes {
                last = Some(service.apply(Update::Step { id, change }).await?);
            }
            print_json(&last)?;
        }
    }
    Ok(())
}

async fn run_deps(service: &BasicScheduleService<JsonStorage>, cmd: DepsCommand) -> Result<()> {
    let deps = service.dependencies();
    match cmd {
        DepsCommand::Add { from, to, dep_type, lag } => {
            print_json(&deps.add_dependency(from, to, dep_type, lag).await?)?;
        }
        DepsCommand::Remove { id } => {
            print_json(&deps.remove_dependency(id).await?)?;
        }
        DepsCommand::Set { step, notation } => {
            print_json(&deps.put_step_dependencies_by_code(step, &notation).await?)?;
        }
        DepsCommand::Edit { id, lag, dep_type } => {
            let mut changes = Vec::new();
            if let Some(lag) = lag {
                changes.push(shopfloor_core::DependencyUpdate::SetLag(lag));
            }
            if let Some(dep_type) = dep_type {
                changes.push(shopfloor_core::DependencyUpdate::SetType(dep_type));
            }
            if changes.is_empty() {
                bail!("nothing to update: pass --lag and/or --type");
            }
            let mut last = None;
            for change in changes {
                last = Some(service.apply(Update::Dependency { id, change }).await?);
            }
            print_json(&last)?;
        }
        DepsCommand::Show { step } => {
            println!("{}", deps.dependency_notation(step).await?);
        }
        DepsCommand::Layers { product } => {
            print_json(&deps.topological_layers(product).await?)?;
        }
        DepsCommand::Timing { product, quantity } => {
            print_json(&deps.step_timings(product, quantity).await?)?;
        }
    }
    Ok(())
}

async fn run_entry(service: &BasicScheduleService<JsonStorage>, cmd: EntryCommand) -> Result<()> {
    match cmd {
        EntryCommand::Add { product, step, date, start, end, output, order } => {
            let entry = service
                .register_entry(NewScheduleEntry {
                    product_id: product,
                    order_ref: order,
                    step_id: step,
                    date,
                    planned_start: start,
                    planned_end: end,
                    planned_output: output,
                })
                .await?;
            print_json(&entry)?;
        }
        EntryCommand::Show { id } => {
            print_json(&service.get_schedule_entry(id).await?)?;
        }
        EntryCommand::List { product, step, date, status } => {
            let filter = EntryFilter {
                product_id: product,
                step_id: step,
                date,
                status: status.map(|s| vec![s]),
            };
            print_json(&service.list_entries(&filter).await?)?;
        }
        EntryCommand::Progress { id, status, output, start, end } => {
            let progress = shopfloor_progress::LegacyProgress {
                status,
                actual_output: output,
                actual_start: start,
                actual_end: end,
            };
            print_json(&service.record_legacy_progress(id, progress).await?)?;
        }
    }
    Ok(())
}

async fn run_assignment(service: &BasicScheduleService<JsonStorage>, cmd: AssignmentCommand) -> Result<()> {
    match cmd {
        AssignmentCommand::Start { id } => {
            print_json(&service.apply(Update::Assignment { id, change: AssignmentChange::Start }).await?)?;
        }
        AssignmentCommand::Output { id, output, notes } => {
            if output.is_none() && notes.is_none() {
                bail!("nothing to update: pass an output and/or --notes");
            }
            let change = AssignmentChange::Progress(AssignmentUpdate { actual_output: output, notes });
            print_json(&service.apply(Update::Assignment { id, change }).await?)?;
        }
        AssignmentCommand::Complete { id, output, notes } => {
            let change = AssignmentChange::Complete { actual_output: output, notes };
            print_json(&service.apply(Update::Assignment { id, change }).await?)?;
        }
        AssignmentCommand::History { id } => {
            print_json(&service.get_assignment_output_history(id).await?)?;
        }
        AssignmentCommand::Metrics { id } => {
            print_json(&service.get_assignment_metrics(id).await?)?;
        }
    }
    Ok(())
}

async fn run_efficiency(service: &BasicScheduleService<JsonStorage>, cmd: EfficiencyCommand) -> Result<()> {
    match cmd {
        EfficiencyCommand::Window { start, end, output, standard } => {
            print_json(&compute_efficiency(&EfficiencyInput::from_clock(start, end, output, standard)))?;
        }
        EfficiencyCommand::History { file, product, standards } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records: Vec<ProductionRecord> = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON array of production records", file.display()))?;

            let mut standard_times: HashMap<String, u32> = HashMap::new();
            if let Some(product) = product {
                for step in service.get_product_steps(product).await? {
                    if let Some(code) = step.step.code {
                        standard_times.insert(code, step.step.time_per_piece_seconds);
                    }
                }
            }
            standard_times.extend(standards);

            print_json(&summarize_by_worker(&records, &standard_times))?;
        }
    }
    Ok(())
}
