use std::{fs, path::Path, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nimbus_console::{
    CloudFixture, ConsoleSettings, CreateFlavor, EditFlavor, FlavorContext, InMemoryCloud, LaunchContext, LaunchInstance,
};
use nimbus_engine::{Collaborators, ResourceClient, Workflow, WorkflowDefinition};
use nimbus_types::{FormData, Requester, Resource, ResourceKind};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "nimbus", version, about = "Drive Nimbus console wizards against a cloud fixture")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a submission and finalize the workflow.
    Run {
        workflow: WorkflowKind,
        /// Cloud fixture (YAML or JSON) holding the requester and the remote state.
        #[arg(long)]
        cloud: PathBuf,
        /// Submitted form data (YAML or JSON).
        #[arg(long)]
        submission: PathBuf,
        /// Console settings; defaults to NIMBUS_SETTINGS_PATH or the user config directory.
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Print every enabled step with initial values and fresh choices.
    Render {
        workflow: WorkflowKind,
        #[arg(long)]
        cloud: PathBuf,
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Flavor being edited (edit_flavor only).
        #[arg(long)]
        flavor_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WorkflowKind {
    #[value(name = "launch_instance")]
    LaunchInstance,
    #[value(name = "create_flavor")]
    CreateFlavor,
    #[value(name = "edit_flavor")]
    EditFlavor,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            workflow,
            cloud,
            submission,
            settings,
        } => {
            let env = Environment::load(&cloud, settings.as_deref())?;
            let form: FormData = read_document(&submission)?;
            match workflow {
                WorkflowKind::LaunchInstance => {
                    let seed = LaunchContext::seeded_from(&env.requester);
                    run_workflow(LaunchInstance::new(env.collaborators(), &env.settings), env.requester, seed, &form)
                }
                WorkflowKind::CreateFlavor => {
                    run_workflow(CreateFlavor::new(env.collaborators()), env.requester, FlavorContext::default(), &form)
                }
                WorkflowKind::EditFlavor => {
                    let flavor_id = form
                        .get("flavor_id")
                        .filter(|id| !id.is_empty())
                        .context("edit_flavor requires a flavor_id in the submission")?;
                    let existing = env.flavor(flavor_id)?;
                    let definition = EditFlavor::new(env.collaborators(), &existing);
                    run_workflow(definition, env.requester, FlavorContext::editing(flavor_id), &form)
                }
            }
        }
        Command::Render {
            workflow,
            cloud,
            settings,
            flavor_id,
        } => {
            let env = Environment::load(&cloud, settings.as_deref())?;
            match workflow {
                WorkflowKind::LaunchInstance => {
                    let seed = LaunchContext::seeded_from(&env.requester);
                    render_workflow(LaunchInstance::new(env.collaborators(), &env.settings), env.requester, seed)
                }
                WorkflowKind::CreateFlavor => {
                    render_workflow(CreateFlavor::new(env.collaborators()), env.requester, FlavorContext::default())
                }
                WorkflowKind::EditFlavor => {
                    let flavor_id = flavor_id.context("rendering edit_flavor requires --flavor-id")?;
                    let existing = env.flavor(&flavor_id)?;
                    let definition = EditFlavor::new(env.collaborators(), &existing);
                    render_workflow(definition, env.requester, FlavorContext::editing(flavor_id))
                }
            }
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Cloud, requester and settings shared by every command.
struct Environment {
    cloud: Arc<InMemoryCloud>,
    requester: Requester,
    settings: ConsoleSettings,
}

impl Environment {
    fn load(cloud: &Path, settings: Option<&Path>) -> Result<Self> {
        let fixture: CloudFixture = read_document(cloud)?;
        let settings = match settings {
            Some(path) => ConsoleSettings::load_from_path(path)?,
            None => ConsoleSettings::load()?,
        };
        debug!(
            cloud = %cloud.display(),
            resource_kinds = fixture.resources.len(),
            injected_failures = fixture.failures.len(),
            "loaded cloud fixture"
        );

        Ok(Self {
            cloud: Arc::new(InMemoryCloud::from_fixture(&fixture)),
            requester: fixture.requester,
            settings,
        })
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators::uniform(self.cloud.clone())
    }

    fn flavor(&self, flavor_id: &str) -> Result<Resource> {
        self.cloud
            .get(ResourceKind::Flavor, flavor_id)
            .with_context(|| format!("unable to retrieve flavor '{}'", flavor_id))
    }
}

fn run_workflow<D: WorkflowDefinition>(definition: D, requester: Requester, seed: D::Context, form: &FormData) -> Result<()> {
    let slug = definition.slug().to_string();
    let mut workflow = Workflow::new(definition, requester, seed).with_context(|| format!("workflow '{}' cannot run", slug))?;
    let outcome = workflow
        .run(form)
        .with_context(|| format!("workflow '{}' aborted", slug))?;
    print_json(&outcome)
}

fn render_workflow<D: WorkflowDefinition>(definition: D, requester: Requester, seed: D::Context) -> Result<()> {
    let slug = definition.slug().to_string();
    let mut workflow = Workflow::new(definition, requester, seed).with_context(|| format!("workflow '{}' cannot run", slug))?;
    let view = workflow
        .render()
        .with_context(|| format!("unable to render workflow '{}'", slug))?;
    print_json(&view)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Reads JSON when the extension says so, YAML otherwise.
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("unable to read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("invalid YAML in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn submission_documents_accept_scalars_and_lists() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("temp file");
        writeln!(file, "name: web\ncount: 2\nnetwork: [net-1, net-2]").expect("write");

        let form: FormData = read_document(file.path()).expect("form");

        assert_eq!(form.get("name"), Some("web"));
        assert_eq!(form.get("count"), Some("2"));
        assert_eq!(form.get_all("network"), ["net-1", "net-2"]);
    }

    #[test]
    fn fixtures_load_from_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(
            file,
            r#"{{"requester": {{"user_id": "u-1", "project_id": "p-1"}}, "resources": {{"flavor": [{{"id": "1", "name": "m1.tiny"}}]}}}}"#
        )
        .expect("write");

        let env = Environment::load(file.path(), Some(Path::new("/nonexistent/settings.yaml"))).expect("environment");

        assert_eq!(env.requester.project_id, "p-1");
        assert_eq!(env.flavor("1").expect("flavor").name, "m1.tiny");
    }

    #[test]
    fn workflow_names_match_their_slugs() {
        assert_eq!(
            WorkflowKind::from_str("edit_flavor", false),
            Ok(WorkflowKind::EditFlavor)
        );
        let cli = Cli::try_parse_from(["nimbus", "render", "launch_instance", "--cloud", "cloud.yaml"]).expect("parse");
        assert!(matches!(cli.command, Command::Render { workflow: WorkflowKind::LaunchInstance, .. }));
    }
}
