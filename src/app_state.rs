use crate::{
    api::{storage::ObjectStorage, stripe::StripeClient},
    db::DbPool,
};

/// Process-wide handles, constructed once in `bootstrap` and cloned into
/// every handler. No hidden reinitialization anywhere.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub stripe: StripeClient,
    pub storage: ObjectStorage,
}
