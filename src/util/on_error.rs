//! [`OnError`] extension for [`Result`].

/// Run a side effect, usually a log line, on the error of a [`Result`] while
/// passing the result through untouched.
///
/// ```rust,ignore
/// queue.recover().await.on_err(|err| error!("recovery failed: {err}"))?;
/// ```
pub trait OnError<E> {
    /// Call `f` with the error, if any.
    #[must_use]
    fn on_err<F>(self, f: F) -> Self
    where
        F: FnOnce(&E);
}

impl<T, E> OnError<E> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn on_err<F>(self, f: F) -> Self
    where
        F: FnOnce(&E),
    {
        if let Err(err) = &self {
            f(err);
        }
        self
    }
}
