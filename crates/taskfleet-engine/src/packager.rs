use async_trait::async_trait;
use std::path::PathBuf;
use taskfleet_core::{Artifact, FleetError, FleetResult, RoleOutput, Subtask, Task};

/// Turns a completed task's subtask outputs into artifact references.
///
/// The engine treats the result as opaque: it attaches whatever comes
/// back and never interprets the locators.
#[async_trait]
pub trait ArtifactPackager: Send + Sync {
    /// Package the finished task's outputs into artifact references.
    async fn package(&self, task: &Task, subtasks: &[Subtask]) -> FleetResult<Vec<Artifact>>;
}

/// Packager that produces no artifacts. Used by tests and by deployments
/// that only consume the event feed.
#[derive(Debug, Default)]
pub struct NoopPackager;

#[async_trait]
impl ArtifactPackager for NoopPackager {
    async fn package(&self, _task: &Task, _subtasks: &[Subtask]) -> FleetResult<Vec<Artifact>> {
        Ok(Vec::new())
    }
}

/// Writes each subtask output under `<root>/<task-id>/` and returns
/// `file://` locators.
///
/// Code outputs land as their own files at the paths the coder named;
/// every other output becomes `<sequence>-<role>.txt`.
#[derive(Debug, Clone)]
pub struct FilePackager {
    root: PathBuf,
}

impl FilePackager {
    /// Packager writing under the given root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactPackager for FilePackager {
    async fn package(&self, task: &Task, subtasks: &[Subtask]) -> FleetResult<Vec<Artifact>> {
        let dir = self.root.join(task.id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let mut artifacts = Vec::new();
        for subtask in subtasks {
            let Some(output) = &subtask.output else {
                continue;
            };
            match output {
                RoleOutput::Code { files } => {
                    for file in files {
                        // Keep writes inside the task directory.
                        let name = file.path.replace(['/', '\\'], "_");
                        let path = dir.join(&name);
                        tokio::fs::write(&path, &file.content).await?;
                        artifacts.push(Artifact::new(&file.path, locator(&path)?));
                    }
                }
                other => {
                    let name = format!("{}-{}.txt", subtask.sequence, subtask.role);
                    let path = dir.join(&name);
                    tokio::fs::write(&path, other.as_text()).await?;
                    artifacts.push(Artifact::new(&name, locator(&path)?));
                }
            }
        }
        Ok(artifacts)
    }
}

fn locator(path: &std::path::Path) -> FleetResult<String> {
    let s = path
        .to_str()
        .ok_or_else(|| FleetError::Engine(format!("non-utf8 artifact path {path:?}")))?;
    Ok(format!("file://{s}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use taskfleet_core::{AgentRole, CodeFile, SubtaskStatus};
    use uuid::Uuid;

    fn finished_subtask(task_id: Uuid, sequence: u32, role: AgentRole, output: RoleOutput) -> Subtask {
        let mut st = Subtask::new(task_id, Uuid::new_v4(), role, "work", "build_bay", sequence);
        st.status = SubtaskStatus::Completed;
        st.output = Some(output);
        st
    }

    #[tokio::test]
    async fn test_file_packager_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let packager = FilePackager::new(dir.path());
        let task = Task::new("ship it", None);
        let subtasks = vec![
            finished_subtask(
                task.id,
                0,
                AgentRole::Designer,
                RoleOutput::Design {
                    spec: "two columns".into(),
                },
            ),
            finished_subtask(
                task.id,
                1,
                AgentRole::Coder,
                RoleOutput::Code {
                    files: vec![CodeFile {
                        path: "src/main.rs".into(),
                        content: "fn main() {}".into(),
                    }],
                },
            ),
        ];

        let artifacts = packager.package(&task, &subtasks).await.unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].label, "0-designer.txt");
        assert!(artifacts[1].locator.starts_with("file://"));

        let written = dir.path().join(task.id.to_string()).join("src_main.rs");
        let content = tokio::fs::read_to_string(written).await.unwrap();
        assert_eq!(content, "fn main() {}");
    }

    #[tokio::test]
    async fn test_noop_packager_is_empty() {
        let task = Task::new("quiet", None);
        let artifacts = NoopPackager.package(&task, &[]).await.unwrap();
        assert!(artifacts.is_empty());
    }
}
