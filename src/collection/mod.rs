//! Collection - typed CRUD, pages, batches and realtime listeners over one path.
//!
//! ```ignore
//! let store = Arc::new(InMemoryDocumentStore::new());
//! let tasks: Collection<Task, _> = Collection::new(store, Arc::new(Session::for_user("u1")));
//!
//! let task = tasks.create(Task::new("write docs")).await?;
//! tasks.increment_field("views", 1, &task).await?;
//!
//! let handle = tasks.subscribe(&[Predicate::equals("done", false)], |update| {
//!     if let Ok(open) = update {
//!         println!("{} open tasks", open.len());
//!     }
//! })?;
//! tasks.unsubscribe(handle)?;
//! ```

mod batch;
#[allow(clippy::module_inception)]
mod collection;
mod config;
mod observable;

pub use batch::BatchWrite;
pub use collection::{Collection, SubscriptionHandle};
pub use config::{CollectionConfig, InsertPosition, UpdateStrategy};
pub use observable::{ListChange, ObservableList};
