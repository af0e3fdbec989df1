//! CLI de operación contra el backend Postgres.
//!
//! Códigos de salida: 0 ok, 2 uso incorrecto, 4 operación rechazada por el
//! motor (autorización, concurrencia, estado), 5 falla del sistema.

use std::collections::HashMap;
use std::process::exit;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use ledger_core::{ApprovalEngine, ApprovalMode, ConfigurationError, Connector, DocumentRef, DocumentSubmission,
                  DocumentType, EngineConfig, EngineError, StaticDirectory, WorkflowDefinition, WorkflowStep};
use ledger_documents::AccountTable;
use ledger_persistence::{build_dev_pool_from_env, PgWorkflowStore, PoolProvider};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

type Engine = ApprovalEngine<PgWorkflowStore<PoolProvider>>;

const USAGE: &str = "Uso: ledger-cli <comando> [--flag valor]...
  define       --file <definicion.json>
  definitions  [--type <document_type>]
  activate     --definition <UUID>
  deactivate   --definition <UUID>
  open         --type <document_type> --id <N> --amount <D> --initiator <USER>
               [--branch <N>] [--currency <N> --rate <D>]
  approve      --instance <UUID> --step <UUID> --actor <USER>
  reject       --instance <UUID> --step <UUID> --actor <USER> [--notes <TXT>]
  cancel       --instance <UUID> --actor <USER>
  post         --instance <UUID>
  show         --instance <UUID> | --type <document_type> --id <N>
  inbox        --actor <USER>
  next-number  --key <KEY> [--year <YYYY>]";

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("rechazado: {0}")]
    Rejected(EngineError),
    #[error("error: {0}")]
    System(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Rejected(_) => 4,
            CliError::System(_) => 5,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Storage(_) | EngineError::Collaborator(_) | EngineError::PostingInvariant(_) => {
                CliError::System(err.to_string())
            }
            EngineError::Configuration(ConfigurationError::MissingAccountMapping(_))
            | EngineError::Configuration(ConfigurationError::MissingCollaborator(_)) => CliError::System(err.to_string()),
            other => CliError::Rejected(other),
        }
    }
}

struct Args {
    command: String,
    flags: HashMap<String, String>,
}

impl Args {
    fn parse(raw: &[String]) -> Result<Self, CliError> {
        let command = raw.first().cloned().ok_or_else(|| CliError::Usage(USAGE.to_string()))?;
        let mut flags = HashMap::new();
        let mut i = 1;
        while i < raw.len() {
            let Some(name) = raw[i].strip_prefix("--") else {
                return Err(CliError::Usage(format!("argumento inesperado '{}'\n{USAGE}", raw[i])));
            };
            let value = raw.get(i + 1)
                           .ok_or_else(|| CliError::Usage(format!("falta valor para --{name}")))?;
            flags.insert(name.to_string(), value.clone());
            i += 2;
        }
        Ok(Self { command, flags })
    }

    fn opt(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    fn req(&self, name: &str) -> Result<&str, CliError> {
        self.opt(name)
            .ok_or_else(|| CliError::Usage(format!("falta --{name} para '{}'", self.command)))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, CliError> {
        self.opt(name)
            .map(|v| v.parse::<T>().map_err(|_| CliError::Usage(format!("valor inválido para --{name}: '{v}'"))))
            .transpose()
    }

    fn req_parsed<T: std::str::FromStr>(&self, name: &str) -> Result<T, CliError> {
        self.parsed(name)?
            .ok_or_else(|| CliError::Usage(format!("falta --{name} para '{}'", self.command)))
    }

    fn document_type(&self) -> Result<DocumentType, CliError> {
        self.req("type")?
            .parse()
            .map_err(|e: EngineError| CliError::Usage(e.to_string()))
    }
}

/// Archivo de definición: los pasos llevan sus propios ids para poder
/// referenciar al padre.
#[derive(Debug, Deserialize)]
struct DefinitionFile {
    name: String,
    document_type: DocumentType,
    #[serde(default)]
    branch_id: Option<i64>,
    #[serde(default)]
    approval_mode: ApprovalMode,
    #[serde(default)]
    root_connector: Option<Connector>,
    steps: Vec<WorkflowStep>,
}

impl DefinitionFile {
    fn into_definition(self) -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new(self.name, self.document_type).with_mode(self.approval_mode);
        if let Some(branch) = self.branch_id {
            def = def.for_branch(branch);
        }
        if let Some(connector) = self.root_connector {
            def = def.with_root_connector(connector);
        }
        self.steps.into_iter().fold(def, WorkflowDefinition::with_step)
    }
}

/// `{"permissions": {"controller": ["vouchers.approve"]}, "branches": {"ana": [1]}}`
#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    permissions: HashMap<String, Vec<String>>,
    #[serde(default)]
    branches: HashMap<String, Vec<i64>>,
}

impl DirectoryFile {
    fn into_directory(self) -> StaticDirectory {
        let dir = self.permissions
                      .into_iter()
                      .flat_map(|(actor, perms)| perms.into_iter().map(move |p| (actor.clone(), p)))
                      .fold(StaticDirectory::new(), |d, (actor, perm)| d.grant(actor, perm));
        self.branches
            .into_iter()
            .flat_map(|(actor, branches)| branches.into_iter().map(move |b| (actor.clone(), b)))
            .fold(dir, |d, (actor, branch)| d.add_member(actor, branch))
    }
}

fn read_json_env<T: for<'de> Deserialize<'de> + Default>(var: &str) -> Result<T, CliError> {
    match std::env::var(var) {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path).map_err(|e| CliError::System(format!("{var}={path}: {e}")))?;
            serde_json::from_str(&raw).map_err(|e| CliError::System(format!("{var}={path}: {e}")))
        }
        Err(_) => Ok(T::default()),
    }
}

fn build_engine() -> Result<Engine, CliError> {
    let pool = build_dev_pool_from_env().map_err(|e| CliError::System(format!("pool error: {e}")))?;
    let accounts: AccountTable = read_json_env("LEDGER_ACCOUNTS_FILE")?;
    let directory: DirectoryFile = read_json_env("LEDGER_DIRECTORY_FILE")?;
    Ok(ApprovalEngine::builder(Arc::new(PgWorkflowStore::from_pool(pool))).directory(Arc::new(directory.into_directory()))
                                                                          .accounts(Arc::new(accounts))
                                                                          .config(EngineConfig::from_env())
                                                                          .build()?)
}

fn submission(args: &Args) -> Result<DocumentSubmission, CliError> {
    let document = DocumentRef::new(args.document_type()?, args.req_parsed("id")?);
    let amount: Decimal = args.req_parsed("amount")?;
    let mut sub = DocumentSubmission::in_base(document,
                                              amount,
                                              EngineConfig::from_env().base_currency_id,
                                              args.parsed("branch")?,
                                              args.req("initiator")?);
    if let Some(currency) = args.parsed::<i64>("currency")? {
        let rate: Decimal = args.req_parsed("rate")?;
        sub.currency_id = currency;
        sub.exchange_rate = rate;
        sub.amount_in_base = sub.converted_amount();
    }
    Ok(sub)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| CliError::System(e.to_string()))?;
    println!("{out}");
    Ok(())
}

fn run(args: &Args) -> Result<(), CliError> {
    match args.command.as_str() {
        "define" => {
            let path = args.req("file")?;
            let raw = std::fs::read_to_string(path).map_err(|e| CliError::Usage(format!("{path}: {e}")))?;
            let file: DefinitionFile = serde_json::from_str(&raw).map_err(|e| CliError::Usage(format!("{path}: {e}")))?;
            let def = file.into_definition();
            build_engine()?.save_definition(&def)?;
            println!("definición guardada: {} ({} pasos)", def.id, def.steps.len());
        }
        "definitions" => {
            let filter = match args.opt("type") {
                Some(_) => Some(args.document_type()?),
                None => None,
            };
            for def in build_engine()?.definitions(filter)? {
                println!("{} {} type={} branch={:?} active={} mode={} steps={}",
                         def.id,
                         def.name,
                         def.document_type,
                         def.branch_id,
                         def.active,
                         def.approval_mode,
                         def.steps.len());
            }
        }
        cmd @ ("activate" | "deactivate") => {
            let id: Uuid = args.req_parsed("definition")?;
            build_engine()?.set_definition_active(id, cmd == "activate")?;
            println!("definición {id}: {cmd}");
        }
        "open" => {
            let sub = submission(args)?;
            let engine = build_engine()?;
            let instance = engine.open_instance(&sub)?;
            println!("instancia {} abierta para {} (definición {})",
                     instance.id, instance.document, instance.definition_id);
            for action in engine.actions(instance.id)? {
                println!("  acción pendiente step={}", action.step_id);
            }
        }
        "approve" | "reject" => {
            let instance_id: Uuid = args.req_parsed("instance")?;
            let step_id: Uuid = args.req_parsed("step")?;
            let actor = args.req("actor")?;
            let engine = build_engine()?;
            let out = if args.command == "approve" {
                engine.approve(instance_id, step_id, actor)?
            } else {
                engine.reject(instance_id, step_id, actor, args.opt("notes"))?
            };
            println!("acción {} -> {}; instancia {}", out.action.id, out.action.status, out.instance.status);
            for action in &out.new_actions {
                println!("  nueva acción step={}", action.step_id);
            }
            if let Some(entry) = out.journal_entry {
                println!("  asiento {} ({})", entry.reference(), entry.id);
            }
        }
        "cancel" => {
            let instance_id: Uuid = args.req_parsed("instance")?;
            let instance = build_engine()?.cancel(instance_id, args.req("actor")?)?;
            println!("instancia {} -> {}", instance.id, instance.status);
        }
        "post" => {
            let instance_id: Uuid = args.req_parsed("instance")?;
            let entry = build_engine()?.post(instance_id)?;
            println!("asiento {} ({})", entry.reference(), entry.id);
        }
        "show" => {
            let engine = build_engine()?;
            let instance = match args.parsed::<Uuid>("instance")? {
                Some(id) => engine.instance(id)?,
                None => {
                    let document = DocumentRef::new(args.document_type()?, args.req_parsed("id")?);
                    engine.instance_for_document(document)?
                          .ok_or_else(|| CliError::Rejected(EngineError::NotFound(format!("instance for {document}"))))?
                }
            };
            print_json(&instance)?;
            print_json(&engine.actions(instance.id)?)?;
            print_json(&engine.events(instance.id)?)?;
            if let Some(entry) = engine.journal_entry_for_document(instance.document)? {
                print_json(&entry)?;
            }
        }
        "inbox" => {
            for item in build_engine()?.pending_actions_for(args.req("actor")?)? {
                println!("{} {} step='{}' ({}) amount={} desde {}",
                         item.instance_id,
                         item.document,
                         item.step_name,
                         item.step_id,
                         item.amount_in_base,
                         item.created_at);
            }
        }
        "next-number" => {
            let year = args.parsed::<i32>("year")?.unwrap_or_else(|| Utc::now().year());
            let n = build_engine()?.next_number(args.req("key")?, year)?;
            println!("{n}");
        }
        other => return Err(CliError::Usage(format!("comando desconocido '{other}'\n{USAGE}"))),
    }
    Ok(())
}

fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                                     .with_writer(std::io::stderr)
                                     .try_init();
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let result = Args::parse(&raw).and_then(|args| run(&args));
    if let Err(e) = result {
        eprintln!("[ledger-cli] {e}");
        exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<Args, CliError> {
        Args::parse(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn flags_are_parsed_in_pairs() {
        let a = args(&["open", "--type", "payment_voucher", "--id", "7", "--amount", "12.50", "--initiator", "ana"]).unwrap();
        let sub = submission(&a).unwrap();
        assert_eq!(sub.document, DocumentRef::new(DocumentType::PaymentVoucher, 7));
        assert_eq!(sub.amount_in_base, Decimal::new(1250, 2));
        assert!(matches!(args(&["open", "--type"]), Err(CliError::Usage(_))));
        assert!(matches!(args(&["open", "stray"]), Err(CliError::Usage(_))));
    }

    #[test]
    fn foreign_currency_needs_a_rate() {
        let a = args(&["open", "--type", "receipt_voucher", "--id", "1", "--amount", "100.01", "--initiator", "ana",
                       "--currency", "2"]).unwrap();
        assert!(matches!(submission(&a), Err(CliError::Usage(_))));
    }

    #[test]
    fn engine_errors_map_to_exit_codes() {
        let rejected: CliError = EngineError::Authorization { actor_id: "x".into(),
                                                              step_id: Uuid::nil() }.into();
        assert_eq!(rejected.exit_code(), 4);
        let system: CliError = EngineError::PostingInvariant("unbalanced".into()).into();
        assert_eq!(system.exit_code(), 5);
    }

    #[test]
    fn definition_file_builds_a_forest() {
        let raw = r#"{"name": "pv", "document_type": "payment_voucher", "root_connector": "or",
                      "steps": [{"id": "00000000-0000-0000-0000-000000000001", "parent_id": null, "order": 1,
                                 "name": "controller", "gate": {"min": null, "max": null},
                                 "node": {"kind": "approval", "rule": {"type": "user", "user_id": "ana"}}}]}"#;
        let file: DefinitionFile = serde_json::from_str(raw).unwrap();
        let def = file.into_definition();
        assert_eq!(def.root_connector, Connector::Or);
        assert!(def.validate().is_ok());
    }

    #[test]
    fn directory_file_grants_permissions() {
        use ledger_core::ApproverDirectory;
        let file: DirectoryFile =
            serde_json::from_str(r#"{"permissions": {"ana": ["vouchers.approve"]}, "branches": {"luis": [3]}}"#).unwrap();
        let dir = file.into_directory();
        assert!(dir.has_permission("ana", "vouchers.approve").unwrap());
        assert!(dir.is_branch_member("luis", 3).unwrap());
    }
}
