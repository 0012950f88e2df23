mod history;
mod prompt;
mod queue;
mod upload;
mod view;

pub use history::HistoryApi;
pub use prompt::PromptApi;
pub use queue::QueueApi;
pub use upload::UploadApi;
pub use view::{ViewApi, ViewQuery};
