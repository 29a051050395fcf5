//! PlayKit device authorization: PKCE, the device-code session and the
//! polling flow that turns a user's approval into a player token.

pub mod browser;
pub mod device_code;
pub mod error;
pub mod events;
pub mod flow;
pub mod pkce;
pub mod result;
pub mod status;
pub mod transport;

pub use browser::{BrowserLauncher, NoopBrowser, SystemBrowser};
pub use device_code::{DeviceCodePoll, DeviceCodeSession};
pub use error::{AuthError, AuthErrorCode, FlowFailure};
pub use events::AuthEvent;
pub use flow::{DeviceAuthFlow, StartOutcome};
pub use pkce::PkcePair;
pub use result::DeviceAuthResult;
pub use status::{FlowSnapshot, FlowStatus};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
