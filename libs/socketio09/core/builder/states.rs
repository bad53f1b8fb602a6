/// Type-state markers for the builder pattern
///
/// The handshake endpoint is the only required setting, so the builder
/// tracks a single state: whether the URL has been provided.

use std::marker::PhantomData;

/// Marker trait for URL state
pub trait UrlState {}

/// URL has not been set
pub struct NoUrl;
impl UrlState for NoUrl {}

/// URL has been set
pub struct HasUrl;
impl UrlState for HasUrl {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<U> {
    _url: PhantomData<U>,
}

impl<U> TypeState<U> {
    pub(crate) fn new() -> Self {
        Self { _url: PhantomData }
    }
}

impl<U> Default for TypeState<U> {
    fn default() -> Self {
        Self::new()
    }
}
