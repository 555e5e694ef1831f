/// Fire-and-forget publisher for a named subject.
pub trait Broker: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Hand `payload` to the transport under `subject`.
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), Self::Error>;
}

impl<B: Broker + ?Sized> Broker for std::sync::Arc<B> {
    type Error = B::Error;

    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), Self::Error> {
        (**self).publish(subject, payload)
    }
}
