//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints allocation-relevant store events to stdout in a
//! human-readable format. Enabled via the `logging` feature.
//!
//! ## Output format
//! ```text
//! [network-create] id=n1
//! [network-update] id=n1 subnet=10.0.0.0/24 gateway=10.0.0.1
//! [task-update] id=t1 state=Allocated attachments=1
//! [service-delete] id=s1
//! ```

use async_trait::async_trait;

use crate::events::{Action, Change, Event};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

fn action_str(action: Action) -> &'static str {
    match action {
        Action::Create => "create",
        Action::Update => "update",
        Action::Delete => "delete",
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, event: &Event) {
        match &event.change {
            Change::Network(action, n) => match &n.ipam {
                Some(cfg) => println!(
                    "[network-{}] id={} subnet={} gateway={}",
                    action_str(*action),
                    n.id,
                    cfg.subnet,
                    cfg.gateway
                ),
                None => println!("[network-{}] id={}", action_str(*action), n.id),
            },
            Change::Service(action, s) => {
                println!("[service-{}] id={}", action_str(*action), s.id);
            }
            Change::Task(action, t) => {
                println!(
                    "[task-{}] id={} state={:?} attachments={}",
                    action_str(*action),
                    t.id,
                    t.state,
                    t.attachments.len()
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
