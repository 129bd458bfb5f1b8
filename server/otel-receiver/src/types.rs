//! Response bodies for the receiver.

use serde::Serialize;

/// OTLP/HTTP export response. Always empty: every record is accepted.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
  pub partial_success: PartialSuccess,
}

#[derive(Debug, Default, Serialize)]
pub struct PartialSuccess {}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
  pub error: String,
}
