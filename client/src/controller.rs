//! Public face of the client: one observed session at a time.

use crate::error::Error;
use crate::state::{self, StreamState};
use crate::transport::{ChannelHandle, Delivery, Handler, Transport};
use log::*;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// The accumulated state plus the generation of the channel allowed to
/// change it. Bumped on every `start` and `cancel`.
#[derive(Default)]
struct Shared {
    generation: u64,
    state: StreamState,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // Reducing never panics, so a poisoned lock still holds a consistent state.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns at most one open channel and the state accumulated from it.
///
/// Deliveries are applied one at a time under a mutex, in the order the
/// transport hands them over. The caller only ever reads snapshots.
pub struct SessionController<T: Transport> {
    transport: T,
    base_url: String,
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
    channel: Option<ChannelHandle>,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            shared: Arc::new(Mutex::new(Shared::default())),
            notify: Arc::new(Notify::new()),
            channel: None,
        }
    }

    /// Begin observing the run for `session_id`, optionally limited to some
    /// agents. Any previous channel is closed first.
    ///
    /// Returns once the open has been issued; progress arrives through
    /// [`SessionController::state`].
    pub fn start(&mut self, session_id: &str, agents: Option<&[String]>) -> Result<(), Error> {
        if let Some(mut previous) = self.channel.take() {
            debug!("Closing previous analysis stream before starting {session_id}");
            previous.close();
        }

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = StreamState::connecting(session_id);
            shared.generation
        };
        self.notify.notify_waiters();

        let url = stream_url(&self.base_url, session_id, agents);
        info!("Starting analysis stream for {session_id}");

        match self.transport.open(&url, self.handler(generation)) {
            Ok(channel) => {
                self.channel = Some(channel);
                Ok(())
            }
            Err(e) => {
                error!("Failed to open analysis stream for {session_id}: {e}");
                self.update(generation, |state| state.failed_to_open(e.to_string()));
                Err(e)
            }
        }
    }

    /// Detach from the current run. The producer is not told to stop.
    pub fn cancel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }

        {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            let state = std::mem::take(&mut shared.state);
            shared.state = state.cancelled();
        }
        self.notify.notify_waiters();

        info!("Analysis stream cancelled");
    }

    /// Snapshot of the accumulated state.
    pub fn state(&self) -> StreamState {
        lock(&self.shared).state.clone()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.shared).state.active
    }

    /// Resolve with the final snapshot once the session is no longer active.
    pub async fn wait_until_finished(&self) -> StreamState {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let state = self.state();
            if !state.active {
                return state;
            }

            notified.await;
        }
    }

    /// Resolve with the next snapshot after any change, or immediately if the
    /// session is already inactive.
    pub async fn changed(&self) -> StreamState {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_active() {
            notified.await;
        }

        self.state()
    }

    fn handler(&self, generation: u64) -> Handler {
        let shared = Arc::clone(&self.shared);
        let notify = Arc::clone(&self.notify);

        Box::new(move |delivery: Delivery| {
            {
                let mut guard = lock(&shared);
                if guard.generation != generation {
                    trace!("Dropping delivery from a detached channel");
                    return;
                }
                let state = std::mem::take(&mut guard.state);
                guard.state = state::reduce(state, &delivery);
            }
            notify.notify_waiters();
        })
    }

    fn update(&self, generation: u64, apply: impl FnOnce(StreamState) -> StreamState) {
        {
            let mut shared = lock(&self.shared);
            if shared.generation != generation {
                return;
            }
            let state = std::mem::take(&mut shared.state);
            shared.state = apply(state);
        }
        self.notify.notify_waiters();
    }
}

/// `{base}/systems/{id}/analyze-stream[?agents=a,b]`
pub fn stream_url(base_url: &str, session_id: &str, agents: Option<&[String]>) -> String {
    let mut url = format!(
        "{}/systems/{}/analyze-stream",
        base_url.trim_end_matches('/'),
        urlencoding::encode(session_id)
    );

    if let Some(agents) = agents.filter(|agents| !agents.is_empty()) {
        let list = agents
            .iter()
            .map(|agent| urlencoding::encode(agent).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        url.push_str("?agents=");
        url.push_str(&list);
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FailureKind, SessionStatus, CONNECTION_LOST_MESSAGE};
    use events::{AgentComplete, AgentStatus, AnalysisEvent, LayerComplete};
    use serde_json::json;
    use std::time::Duration;

    /// Keeps every handler it was given so tests can deliver by hand,
    /// including to channels the controller has already closed.
    #[derive(Clone, Default)]
    struct ManualTransport {
        opened: Arc<Mutex<Vec<(String, Handler)>>>,
    }

    impl ManualTransport {
        fn deliver(&self, channel: usize, delivery: Delivery) {
            let mut opened = self.opened.lock().unwrap();
            (opened[channel].1)(delivery);
        }

        fn url(&self, channel: usize) -> String {
            self.opened.lock().unwrap()[channel].0.clone()
        }
    }

    impl Transport for ManualTransport {
        fn open(&self, url: &str, handler: Handler) -> Result<ChannelHandle, Error> {
            self.opened
                .lock()
                .unwrap()
                .push((url.to_string(), handler));
            Ok(ChannelHandle::detached())
        }
    }

    /// Plays a fixed script on a spawned task, like a real connection would.
    struct ScriptedTransport {
        script: Vec<(Duration, Delivery)>,
    }

    impl Transport for ScriptedTransport {
        fn open(&self, _url: &str, mut handler: Handler) -> Result<ChannelHandle, Error> {
            let script = self.script.clone();
            let task = tokio::spawn(async move {
                for (delay, delivery) in script {
                    tokio::time::sleep(delay).await;
                    handler(delivery);
                }
            });
            Ok(ChannelHandle::new(task))
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn open(&self, url: &str, _handler: Handler) -> Result<ChannelHandle, Error> {
            Err(Error::invalid_url(url, "relative URL without a base"))
        }
    }

    fn stage(progress: u8, message: &str) -> Delivery {
        Delivery::Event(AnalysisEvent::stage("stage", message, progress))
    }

    fn layer(index: u32) -> Delivery {
        Delivery::Event(AnalysisEvent::LayerComplete(LayerComplete {
            layer_name: format!("layer_{index}"),
            layer_index: index,
            total_layers: 6,
            finding_count: 0,
        }))
    }

    fn agent(index: u32) -> Delivery {
        Delivery::Event(AnalysisEvent::AgentComplete(AgentComplete {
            agent_name: format!("agent_{index}"),
            status: AgentStatus::Success,
            finding_count: index % 3,
            perspective: Some("operations".to_string()),
        }))
    }

    #[test]
    fn test_stream_url_without_filter() {
        assert_eq!(
            stream_url("http://localhost:4000/", "pump 7", None),
            "http://localhost:4000/systems/pump%207/analyze-stream"
        );
        assert_eq!(
            stream_url("http://localhost:4000", "pump-7", Some(&[])),
            "http://localhost:4000/systems/pump-7/analyze-stream"
        );
    }

    #[test]
    fn test_stream_url_with_agent_filter() {
        let agents = vec!["thermal".to_string(), "flow rate".to_string()];

        assert_eq!(
            stream_url("http://localhost:4000", "pump-7", Some(&agents)),
            "http://localhost:4000/systems/pump-7/analyze-stream?agents=thermal,flow%20rate"
        );
    }

    #[test]
    fn test_start_resets_state_and_opens_run_scoped_url() {
        let transport = ManualTransport::default();
        let mut controller = SessionController::new(transport.clone(), "http://api");

        controller.start("pump-7", None).unwrap();

        let state = controller.state();
        assert!(state.active);
        assert_eq!(state.message, "Connecting...");
        assert_eq!(state.session_id.as_deref(), Some("pump-7"));
        assert_eq!(transport.url(0), "http://api/systems/pump-7/analyze-stream");
    }

    #[test]
    fn test_full_run_through_controller() {
        let transport = ManualTransport::default();
        let mut controller = SessionController::new(transport.clone(), "http://api");
        controller.start("pump-7", None).unwrap();

        transport.deliver(0, stage(10, "Connecting"));
        transport.deliver(0, stage(50, "Running layers"));
        for i in 0..6 {
            transport.deliver(0, layer(i));
        }
        for i in 0..13 {
            transport.deliver(0, agent(i));
        }
        transport.deliver(
            0,
            Delivery::Event(AnalysisEvent::Result(json!({"health_score": 87.5}))),
        );

        let state = controller.state();
        assert!(!state.active);
        assert_eq!(state.status, SessionStatus::Completed);
        assert_eq!(state.progress, 100);
        assert_eq!(state.message, "Analysis complete");
        assert_eq!(state.layers.len(), 6);
        assert_eq!(state.agents.len(), 13);
        assert_eq!(state.result, Some(json!({"health_score": 87.5})));
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_restart_detaches_old_channel() {
        let transport = ManualTransport::default();
        let mut controller = SessionController::new(transport.clone(), "http://api");

        controller.start("pump-7", None).unwrap();
        transport.deliver(0, stage(40, "old run"));

        controller.start("pump-8", None).unwrap();
        transport.deliver(0, stage(90, "late from old run"));
        transport.deliver(0, layer(0));
        transport.deliver(0, Delivery::Event(AnalysisEvent::Result(json!({}))));
        transport.deliver(1, stage(5, "new run"));

        let state = controller.state();
        assert!(state.active);
        assert_eq!(state.session_id.as_deref(), Some("pump-8"));
        assert_eq!(state.progress, 5);
        assert_eq!(state.message, "new run");
        assert!(state.layers.is_empty());
        assert!(state.result.is_none());
    }

    #[test]
    fn test_cancel_mid_stream_ignores_late_delivery() {
        let transport = ManualTransport::default();
        let mut controller = SessionController::new(transport.clone(), "http://api");
        controller.start("pump-7", None).unwrap();
        transport.deliver(0, stage(30, "Running layers"));

        controller.cancel();
        transport.deliver(0, stage(60, "late"));
        transport.deliver(0, Delivery::Event(AnalysisEvent::Result(json!({}))));

        let state = controller.state();
        assert!(!state.active);
        assert_eq!(state.message, "Cancelled");
        assert_eq!(state.status, SessionStatus::Cancelled);
        assert_eq!(state.progress, 30);
        assert!(state.result.is_none());
    }

    #[test]
    fn test_cancel_without_session_is_harmless() {
        let mut controller = SessionController::new(ManualTransport::default(), "http://api");

        controller.cancel();
        controller.cancel();

        let state = controller.state();
        assert!(!state.active);
        assert_eq!(state.message, "Cancelled");
    }

    #[test]
    fn test_open_failure_marks_session_errored() {
        let mut controller = SessionController::new(FailingTransport, "api");

        let err = controller.start("pump-7", None).unwrap_err();

        let state = controller.state();
        assert!(!state.active);
        assert_eq!(state.status, SessionStatus::Errored);
        assert_eq!(state.error, Some(err.to_string()));
    }

    #[tokio::test]
    async fn test_wait_until_finished_after_connection_lost() {
        let transport = ScriptedTransport {
            script: vec![
                (Duration::from_millis(5), stage(10, "a")),
                (Duration::from_millis(5), stage(20, "b")),
                (
                    Duration::from_millis(5),
                    Delivery::ConnectionLost("reset by peer".to_string()),
                ),
            ],
        };
        let mut controller = SessionController::new(transport, "http://api");
        controller.start("pump-7", None).unwrap();

        let state = controller.wait_until_finished().await;

        assert!(!state.active);
        assert_eq!(state.error.as_deref(), Some(CONNECTION_LOST_MESSAGE));
        assert_eq!(state.error_kind, Some(FailureKind::ConnectionLost));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_scripted_channel() {
        let transport = ScriptedTransport {
            script: vec![
                (Duration::from_millis(1), stage(10, "Connecting")),
                (
                    Duration::from_secs(60),
                    Delivery::Event(AnalysisEvent::Result(json!({}))),
                ),
            ],
        };
        let mut controller = SessionController::new(transport, "http://api");
        controller.start("pump-7", None).unwrap();

        let state = controller.changed().await;
        assert_eq!(state.progress, 10);

        controller.cancel();
        tokio::time::sleep(Duration::from_secs(120)).await;

        let state = controller.state();
        assert_eq!(state.message, "Cancelled");
        assert!(state.result.is_none());
    }
}
