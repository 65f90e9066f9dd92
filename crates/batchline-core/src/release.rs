//! Releaser capability: the downstream consumer of completed batches

/// Receives batches from a [`Batcher`](crate::Batcher).
///
/// A batch may be partial if the interval lapsed before it filled. The
/// releaser owns the batch once called; the batcher keeps no reference to it.
/// `release` runs on the caller's thread and blocks the batcher operation
/// that triggered it.
pub trait Releaser<B> {
    fn release(&mut self, batch: B);
}

/// Adapter allowing a plain closure to act as a [`Releaser`].
pub struct ReleaseFn<F>(pub F);

impl<B, F> Releaser<B> for ReleaseFn<F>
where
    F: FnMut(B),
{
    fn release(&mut self, batch: B) {
        (self.0)(batch);
    }
}

impl<B, R: Releaser<B> + ?Sized> Releaser<B> for &mut R {
    fn release(&mut self, batch: B) {
        (**self).release(batch);
    }
}

impl<B, R: Releaser<B> + ?Sized> Releaser<B> for Box<R> {
    fn release(&mut self, batch: B) {
        (**self).release(batch);
    }
}
