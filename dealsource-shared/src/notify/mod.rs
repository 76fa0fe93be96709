/// Outbound notifications
///
/// - `email`: SMTP delivery for account emails (password reset)
/// - `sms`: SMS gateway used by the vendor pipeline
///
/// Both transports sit behind traits so the API and worker can be handed a
/// recording double in tests.

pub mod email;
pub mod sms;
