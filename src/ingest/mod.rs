/// Uplink ingestion.
///
/// Submodules:
/// - `ttn`:    TTN wire format, webhook parsing, Storage Integration client.
/// - `uplink`: defaulting/clamping of decoded fields and the append path.

pub mod ttn;
pub mod uplink;

pub use ttn::{TtnClient, UplinkSource};
pub use uplink::{ingest_webhook, IngestReceipt};
