use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use taskplan::cross_build::{
    PeerBuildController, PeerTaskHandle, PeerTaskIdentifier, PeerTaskState,
};
use taskplan::engine::RuntimeEvent;
use taskplan::errors::{Result, TaskplanError};
use taskplan::plan::NodeId;
use tokio::sync::mpsc;

/// A fake peer-build controller for driving cross-build nodes in tests.
///
/// Register the tasks a "peer build" contains up front, then settle them
/// from the test with [`complete`]; every node queued against the task
/// receives a `PeerTaskUpdated` event.
///
/// [`complete`]: FakePeerBuilds::complete
#[derive(Default)]
pub struct FakePeerBuilds {
    tasks: Mutex<HashMap<PeerTaskIdentifier, Arc<FakePeerTask>>>,
}

impl FakePeerBuilds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task that peers can locate.
    pub fn register(&self, build: &str, task_path: &str) {
        let id = PeerTaskIdentifier {
            build: build.to_string(),
            task_path: task_path.to_string(),
        };
        let mut tasks = self.tasks.lock().unwrap();
        tasks.entry(id).or_insert_with(|| Arc::new(FakePeerTask::new()));
    }

    /// Settle a registered task and notify every queued node.
    pub async fn complete(&self, build: &str, task_path: &str, state: PeerTaskState) {
        let id = PeerTaskIdentifier {
            build: build.to_string(),
            task_path: task_path.to_string(),
        };
        let task = {
            let tasks = self.tasks.lock().unwrap();
            tasks.get(&id).cloned().expect("task not registered")
        };
        task.settle(state).await;
    }

    /// Paths of tasks that have at least one queued node.
    pub fn queued_count(&self, build: &str, task_path: &str) -> usize {
        let id = PeerTaskIdentifier {
            build: build.to_string(),
            task_path: task_path.to_string(),
        };
        let tasks = self.tasks.lock().unwrap();
        tasks
            .get(&id)
            .map(|t| t.subscribers.lock().unwrap().len())
            .unwrap_or(0)
    }
}

impl PeerBuildController for FakePeerBuilds {
    fn locate_task(&self, id: &PeerTaskIdentifier) -> Result<Arc<dyn PeerTaskHandle>> {
        let tasks = self.tasks.lock().unwrap();
        match tasks.get(id) {
            Some(task) => Ok(Arc::clone(task) as Arc<dyn PeerTaskHandle>),
            None => Err(TaskplanError::PeerTaskNotFound {
                build: id.build.clone(),
                task: id.task_path.clone(),
            }),
        }
    }
}

/// One task living in a fake peer build.
struct FakePeerTask {
    state: Mutex<PeerTaskState>,
    subscribers: Mutex<Vec<(NodeId, mpsc::Sender<RuntimeEvent>)>>,
}

impl FakePeerTask {
    fn new() -> Self {
        Self {
            state: Mutex::new(PeerTaskState::Waiting),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    async fn settle(&self, state: PeerTaskState) {
        {
            let mut current = self.state.lock().unwrap();
            *current = state;
        }
        let subscribers: Vec<_> = {
            let guard = self.subscribers.lock().unwrap();
            guard.clone()
        };
        for (node, events) in subscribers {
            let _ = events
                .send(RuntimeEvent::PeerTaskUpdated { node, state })
                .await;
        }
    }
}

impl PeerTaskHandle for FakePeerTask {
    fn queue_for_execution(&self, node: NodeId, events: mpsc::Sender<RuntimeEvent>) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.push((node, events));
    }

    fn state(&self) -> PeerTaskState {
        *self.state.lock().unwrap()
    }
}
