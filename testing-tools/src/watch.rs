use analysis_client::{SessionController, StreamState, Transport};
use colored::*;
use log::*;

use crate::output::print_progress;

/// Follow one session until it finishes or the user interrupts.
///
/// Ctrl-C detaches the observer; the run keeps going on the server.
pub async fn watch<T: Transport>(controller: &mut SessionController<T>) -> StreamState {
    let mut previous = StreamState::default();

    loop {
        let next = tokio::select! {
            state = controller.changed() => Some(state),
            _ = tokio::signal::ctrl_c() => None,
        };

        let current = match next {
            Some(state) => state,
            None => {
                println!("\n{} Interrupted, detaching from the run", "!".yellow());
                controller.cancel();
                controller.state()
            }
        };

        print_progress(&previous, &current);

        if !current.active {
            debug!("Session finished with status {:?}", current.status);
            return current;
        }

        previous = current;
    }
}
