//! Clinic CLI
//!
//! Office front-end over a JSON snapshot in the data directory. Every
//! command authenticates with `--login` / `--password`; staff management and
//! statistics require the administrator account from the configuration.
//!
//! Usage:
//!   clinic staff add --account <l> --secret <pw> --name <n> --surname <s> --specialty <sp> --rights <code>
//!   clinic staff password <account> <new-password>
//!   clinic patient add --name <n> --surname <s> --sex <M|F> [--born <date>]
//!   clinic consult book --at "2024-01-10 09:00" --patient <id> --reason <text>
//!   clinic planning day 2024-01-10
//!   clinic stats

use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use clinic_core::*;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Parser)]
#[command(name = "clinic")]
#[command(version)]
#[command(about = "Consultation scheduling and patient records for a medical office", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "clinic.toml", env = "CLINIC_CONFIG")]
    config: PathBuf,

    /// Data directory (overrides config file)
    #[arg(short, long, env = "CLINIC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Acting account
    #[arg(short, long, env = "CLINIC_LOGIN")]
    login: String,

    /// Password of the acting account
    #[arg(short, long, env = "CLINIC_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Practitioner accounts (administrator only)
    #[command(subcommand)]
    Staff(StaffCommand),

    /// Patient management (right 1)
    #[command(subcommand)]
    Patient(PatientCommand),

    /// Medical history (right 5)
    #[command(subcommand)]
    Condition(ConditionCommand),

    /// Booking (right 2) and closing (right 4) consultations
    #[command(subcommand)]
    Consult(ConsultCommand),

    /// Own planning (right 3)
    #[command(subcommand)]
    Planning(PlanningCommand),

    /// Office statistics (administrator only)
    Stats,
}

#[derive(Subcommand)]
enum StaffCommand {
    /// Create an account
    Add {
        #[arg(long = "account")]
        login: String,
        #[arg(long)]
        secret: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        specialty: String,
        /// Capability code, e.g. "143"
        #[arg(long)]
        rights: Capabilities,
        #[arg(long)]
        order_number: Option<String>,
        #[arg(long)]
        availability: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// List accounts
    List,
    /// Replace an account's capability code
    Rights { account: String, code: Capabilities },
    /// Set a new password for an account
    Password {
        account: String,
        #[arg(env = "CLINIC_NEW_PASSWORD", hide_env_values = true)]
        secret: String,
    },
    /// Re-enable an account
    Activate { account: String },
    /// Disable an account without deleting it
    Deactivate { account: String },
    /// Change contact details
    Contact {
        account: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Delete an account; its consultations are kept
    Remove { account: String },
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Register a patient (id defaults to the next free one)
    Add {
        #[arg(long)]
        id: Option<u32>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        surname: String,
        #[arg(long)]
        sex: Sex,
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        born: Option<String>,
        #[arg(long)]
        national_id: Option<String>,
        #[arg(long)]
        blood_group: Option<String>,
    },
    /// Show one patient and their record
    Show { id: u32 },
    /// List all patients
    List,
    /// Change demographics; omitted fields are kept
    Update {
        id: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        surname: Option<String>,
        #[arg(long)]
        born: Option<String>,
        #[arg(long)]
        blood_group: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConditionCommand {
    /// Add a condition to a patient's record
    Add {
        patient: u32,
        #[arg(long)]
        kind: String,
        #[arg(long)]
        description: String,
        /// Onset date (YYYY-MM-DD)
        #[arg(long)]
        onset: String,
        #[arg(long, default_value = "moderate")]
        severity: Severity,
    },
    /// List a patient's conditions
    List { patient: u32 },
    /// Change severity or active flag
    Update {
        patient: u32,
        condition: u32,
        #[arg(long)]
        severity: Option<Severity>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Record and consultation history of a patient
    History { patient: u32 },
}

#[derive(Subcommand)]
enum ConsultCommand {
    /// Book a consultation
    Book {
        /// Start (YYYY-MM-DD HH:MM)
        #[arg(long)]
        at: String,
        #[arg(long)]
        patient: u32,
        #[arg(long)]
        reason: String,
        /// Practitioner login (defaults to the acting account)
        #[arg(long)]
        practitioner: Option<String>,
        /// Length in minutes (defaults to the configured duration)
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Cancel one of your consultations
    Cancel { id: u32 },
    /// Change the length of a scheduled consultation
    Duration { id: u32, minutes: u32 },
    /// Record observations
    Observe { id: u32, text: String },
    /// Record a diagnosis
    Diagnose { id: u32, text: String },
    /// Mark as completed
    Complete { id: u32 },
    /// Record observations and diagnosis and complete in one step
    Close {
        id: u32,
        #[arg(long)]
        observations: String,
        #[arg(long)]
        diagnosis: String,
    },
}

#[derive(Subcommand)]
enum PlanningCommand {
    /// One day (YYYY-MM-DD)
    Day { date: String },
    /// Seven days starting at a date
    Week { start: String },
    /// A calendar month
    Month { year: i32, month: u32 },
    /// Inclusive date range
    Range { start: String, end: String },
    /// Every upcoming and past consultation
    All,
}

impl Commands {
    fn mutates(&self) -> bool {
        match self {
            Commands::Staff(cmd) => !matches!(cmd, StaffCommand::List),
            Commands::Patient(cmd) => matches!(cmd, PatientCommand::Add { .. } | PatientCommand::Update { .. }),
            Commands::Condition(cmd) => matches!(cmd, ConditionCommand::Add { .. } | ConditionCommand::Update { .. }),
            Commands::Consult(_) => true,
            Commands::Planning(_) | Commands::Stats => false,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ClinicConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.storage.data_dir = data_dir;
    }

    // Initialize tracing; RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(data_dir = %config.storage.data_dir.display(), "configuration loaded");

    let store = SnapshotStore::in_dir(&config.storage.data_dir);
    let mut clinic = Clinic::from_snapshot(store.load()?)
        .with_context(|| format!("inconsistent snapshot {}", store.path().display()))?
        .with_default_duration(config.scheduling.default_duration_minutes);

    let mutates = cli.command.mutates();
    match cli.command {
        Commands::Staff(cmd) => {
            require_admin(&config, &cli.login, &cli.password)?;
            run_staff(&mut clinic, cmd)?;
        }
        Commands::Stats => {
            require_admin(&config, &cli.login, &cli.password)?;
            print_stats(&clinic.stats());
        }
        Commands::Patient(cmd) => {
            let actor = authenticate(&clinic, &cli.login, &cli.password)?;
            run_patient(&mut clinic, &actor, cmd)?;
        }
        Commands::Condition(cmd) => {
            let actor = authenticate(&clinic, &cli.login, &cli.password)?;
            run_condition(&mut clinic, &actor, cmd)?;
        }
        Commands::Consult(cmd) => {
            let actor = authenticate(&clinic, &cli.login, &cli.password)?;
            run_consult(&mut clinic, &actor, cmd)?;
        }
        Commands::Planning(cmd) => {
            let actor = authenticate(&clinic, &cli.login, &cli.password)?;
            run_planning(&clinic, &actor, cmd)?;
        }
    }

    if mutates {
        store.save(&clinic.snapshot())?;
    }
    Ok(())
}

fn authenticate(clinic: &Clinic, login: &str, password: &str) -> anyhow::Result<String> {
    let account = clinic.staff().authenticate(login, password)?;
    info!(actor = %account.login, "authenticated");
    Ok(account.login.clone())
}

fn require_admin(config: &ClinicConfig, login: &str, password: &str) -> anyhow::Result<()> {
    if login != config.admin.login || password != config.admin.password {
        bail!("administrator credentials required");
    }
    Ok(())
}

// ============================================================================
// Command handlers
// ============================================================================

fn run_staff(clinic: &mut Clinic, cmd: StaffCommand) -> anyhow::Result<()> {
    let staff = clinic.staff_mut();
    match cmd {
        StaffCommand::Add {
            login,
            secret,
            name,
            surname,
            specialty,
            rights,
            order_number,
            availability,
            email,
            phone,
        } => {
            let mut practitioner = Practitioner::new(login, secret, name, surname, specialty, rights);
            practitioner.order_number = order_number;
            practitioner.availability = availability;
            practitioner.email = email;
            practitioner.phone = phone;
            let login = practitioner.login.trim().to_string();
            staff.create(practitioner)?;
            println!("Account {} created with rights {}", login, rights);
        }
        StaffCommand::List => {
            for p in staff.list() {
                println!(
                    "{:<16} {:<24} {:<20} rights={:<5} {}",
                    p.login,
                    p.full_name(),
                    p.specialty,
                    p.capabilities,
                    if p.active { "active" } else { "inactive" }
                );
            }
        }
        StaffCommand::Rights { account, code } => {
            staff.set_capabilities(&account, code)?;
            println!("Rights of {} set to {}", account, code);
        }
        StaffCommand::Password { account, secret } => {
            staff.set_password(&account, &secret)?;
            println!("Password of {} changed", account);
        }
        StaffCommand::Activate { account } => {
            staff.set_active(&account, true)?;
            println!("Account {} activated", account);
        }
        StaffCommand::Deactivate { account } => {
            staff.set_active(&account, false)?;
            println!("Account {} deactivated", account);
        }
        StaffCommand::Contact { account, email, phone } => {
            staff.update_contact(&account, email, phone)?;
            println!("Contact details of {} updated", account);
        }
        StaffCommand::Remove { account } => {
            let removed = staff.remove(&account)?;
            println!("Account {} ({}) removed", removed.login, removed.full_name());
        }
    }
    Ok(())
}

fn run_patient(clinic: &mut Clinic, actor: &str, cmd: PatientCommand) -> anyhow::Result<()> {
    match cmd {
        PatientCommand::Add {
            id,
            name,
            surname,
            sex,
            born,
            national_id,
            blood_group,
        } => {
            let id = match id {
                Some(id) => PatientId(id),
                None => clinic.next_patient_id(actor)?,
            };
            let mut patient = NewPatient::new(id, name, surname, sex);
            if let Some(born) = born {
                patient = patient.born(parse_date(&born)?);
            }
            if let Some(national_id) = national_id {
                patient = patient.with_national_id(national_id);
            }
            if let Some(blood_group) = blood_group {
                patient = patient.with_blood_group(blood_group);
            }
            let id = clinic.create_patient(actor, patient)?;
            let record = clinic.patient(actor, id)?.record().id();
            println!("Patient {} created (record {})", id, record);
        }
        PatientCommand::Show { id } => {
            let patient = clinic.patient(actor, PatientId(id))?;
            print_patient(patient);
            let record = patient.record();
            println!(
                "  record {} created {} updated {}, {} condition(s), {} consultation(s)",
                record.id(),
                record.created_at().format(DATE_TIME_FORMAT),
                record.updated_at().format(DATE_TIME_FORMAT),
                record.conditions().len(),
                record.consultations().len()
            );
        }
        PatientCommand::List => {
            for patient in clinic.patients(actor)? {
                print_patient(patient);
            }
        }
        PatientCommand::Update {
            id,
            name,
            surname,
            born,
            blood_group,
        } => {
            let update = PatientUpdate {
                name,
                surname,
                birth_date: born.as_deref().map(parse_date).transpose()?,
                blood_group,
            };
            clinic.update_patient(actor, PatientId(id), update)?;
            println!("Patient {} updated", id);
        }
    }
    Ok(())
}

fn run_condition(clinic: &mut Clinic, actor: &str, cmd: ConditionCommand) -> anyhow::Result<()> {
    match cmd {
        ConditionCommand::Add {
            patient,
            kind,
            description,
            onset,
            severity,
        } => {
            let condition = NewCondition::new(kind, description, parse_date(&onset)?).severity(severity);
            let id = clinic.add_condition(actor, PatientId(patient), condition)?;
            println!("Condition {} added to patient {}", id, patient);
        }
        ConditionCommand::List { patient } => {
            let conditions = clinic.conditions(actor, PatientId(patient))?;
            if conditions.is_empty() {
                println!("No conditions recorded");
            }
            for condition in conditions {
                print_condition(condition);
            }
        }
        ConditionCommand::Update {
            patient,
            condition,
            severity,
            active,
        } => {
            let update = ConditionUpdate { severity, active };
            clinic.update_condition(actor, PatientId(patient), ConditionId(condition), update)?;
            println!("Condition {} updated", condition);
        }
        ConditionCommand::History { patient } => {
            let history = clinic.history(actor, PatientId(patient))?;
            print_patient(history.patient);
            for condition in history.patient.record().conditions() {
                print_condition(condition);
            }
            print_consultations(&history.consultations);
        }
    }
    Ok(())
}

fn run_consult(clinic: &mut Clinic, actor: &str, cmd: ConsultCommand) -> anyhow::Result<()> {
    match cmd {
        ConsultCommand::Book {
            at,
            patient,
            reason,
            practitioner,
            duration,
        } => {
            let at = parse_date_time(&at)?;
            let practitioner = practitioner.unwrap_or_else(|| actor.to_string());
            let id = clinic.schedule(actor, at, &reason, &practitioner, PatientId(patient), duration)?;
            println!("Consultation #{} booked for {} at {}", id, practitioner, at.format(DATE_TIME_FORMAT));
        }
        ConsultCommand::Cancel { id } => {
            clinic.cancel(actor, ConsultationId(id))?;
            println!("Consultation #{} cancelled", id);
        }
        ConsultCommand::Duration { id, minutes } => {
            clinic.set_duration(actor, ConsultationId(id), minutes)?;
            println!("Consultation #{} now lasts {} min", id, minutes);
        }
        ConsultCommand::Observe { id, text } => {
            clinic.record_observations(actor, ConsultationId(id), &text)?;
            println!("Observations recorded on #{}", id);
        }
        ConsultCommand::Diagnose { id, text } => {
            clinic.record_diagnosis(actor, ConsultationId(id), &text)?;
            println!("Diagnosis recorded on #{}", id);
        }
        ConsultCommand::Complete { id } => {
            clinic.complete(actor, ConsultationId(id))?;
            println!("Consultation #{} completed", id);
        }
        ConsultCommand::Close {
            id,
            observations,
            diagnosis,
        } => {
            clinic.close(actor, ConsultationId(id), &observations, &diagnosis)?;
            println!("Consultation #{} closed", id);
        }
    }
    Ok(())
}

fn run_planning(clinic: &Clinic, actor: &str, cmd: PlanningCommand) -> anyhow::Result<()> {
    let view = match cmd {
        PlanningCommand::Day { date } => clinic.day_view(actor, parse_date(&date)?)?,
        PlanningCommand::Week { start } => clinic.week_view(actor, parse_date(&start)?)?,
        PlanningCommand::Month { year, month } => clinic.month_view(actor, year, month)?,
        PlanningCommand::Range { start, end } => {
            clinic.range_view(actor, parse_date(&start)?, parse_date(&end)?)?
        }
        PlanningCommand::All => clinic.full_view(actor)?,
    };
    if view.is_empty() {
        println!("No consultations");
    }
    print_consultations(&view);
    Ok(())
}

// ============================================================================
// Parsing & output
// ============================================================================

fn parse_date_time(s: &str) -> Result<NaiveDateTime, ClinicError> {
    NaiveDateTime::parse_from_str(s.trim(), DATE_TIME_FORMAT)
        .map_err(|e| ClinicError::validation("date-time", format!("'{}' is not YYYY-MM-DD HH:MM ({})", s, e)))
}

fn parse_date(s: &str) -> Result<NaiveDate, ClinicError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| ClinicError::validation("date", format!("'{}' is not YYYY-MM-DD ({})", s, e)))
}

fn print_patient(patient: &Patient) {
    println!(
        "{:>5}  {:<28} {}  born {}  blood {}",
        patient.id,
        patient.full_name(),
        patient.sex,
        patient
            .birth_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string()),
        patient.blood_group.as_deref().unwrap_or("-")
    );
}

fn print_condition(condition: &Condition) {
    println!(
        "  [{}] {} - {} (since {}, {}{})",
        condition.id(),
        condition.kind(),
        condition.description(),
        condition.onset().format(DATE_FORMAT),
        condition.severity(),
        if condition.is_active() { "" } else { ", resolved" }
    );
}

fn print_consultations(consultations: &[&Consultation]) {
    for c in consultations {
        println!(
            "#{:<5} {} - {}  {:<10} patient {:<5} {:<12} {}",
            c.id(),
            c.scheduled_at().format(DATE_TIME_FORMAT),
            c.ends_at().format("%H:%M"),
            c.status(),
            c.patient(),
            c.practitioner(),
            c.reason()
        );
        if let Some(diagnosis) = c.diagnosis() {
            println!("        diagnosis: {}", diagnosis);
        }
    }
}

fn print_stats(stats: &ClinicStats) {
    println!("Patients:      {}", stats.patients);
    println!("Practitioners: {}", stats.practitioners);
    println!("Consultations: {}", stats.consultations);
    for status in [
        ConsultationStatus::Scheduled,
        ConsultationStatus::Completed,
        ConsultationStatus::Cancelled,
    ] {
        println!("  {:<10} {}", status, stats.count(status));
    }
    println!("Per practitioner:");
    for (name, count) in &stats.by_practitioner {
        println!("  {:<28} {}", name, count);
    }
}
