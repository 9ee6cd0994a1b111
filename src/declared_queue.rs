//! [`DeclaredQueue`] definition.

/// The broker's answer to a queue declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredQueue {
    /// Name of the queue.
    pub name: String,
    /// Messages ready in the queue at declaration time.
    pub message_count: u32,
    /// Consumers registered on the queue at declaration time.
    pub consumer_count: u32,
}

impl DeclaredQueue {
    /// A queue as reported by the broker.
    #[must_use]
    pub fn new(name: impl Into<String>, message_count: u32, consumer_count: u32) -> Self {
        Self {
            name: name.into(),
            message_count,
            consumer_count,
        }
    }
}

impl From<lapin::Queue> for DeclaredQueue {
    fn from(queue: lapin::Queue) -> Self {
        Self::new(
            queue.name().as_str(),
            queue.message_count(),
            queue.consumer_count(),
        )
    }
}
