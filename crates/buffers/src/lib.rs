pub mod chat_window;
pub mod observation;

pub use chat_window::ChatWindow;
pub use observation::ObservationBuffer;
