//! Provider Codec (C2): a deterministic, round-trip-exact conversion
//! between the opaque `providerSpec`/`providerStatus` blobs carried on a
//! `CredentialsRequest` and the AWS-typed records the actuator works with.
//!
//! `decode(encode(x)) == x` is the property this module exists to uphold;
//! see the `codec` tests at the bottom for the check.

use crate::util::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One statement of an AWS IAM inline policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatementEntry {
    pub effect: String,
    pub action: Vec<String>,
    pub resource: Vec<String>,
}

/// The decoded shape of `CredentialsRequestSpec::provider_spec` for the
/// AWS actuator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct AwsProviderSpec {
    #[serde(rename = "statementEntries")]
    pub statement_entries: Vec<StatementEntry>,
}

/// The decoded shape of `CredentialsRequestStatus::provider_status` for
/// the AWS actuator: records what the actuator created, so a restart can
/// recognize its own work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct AwsProviderStatus {
    pub user: String,
    pub policy: String,
}

pub fn decode_spec(value: &Value) -> Result<AwsProviderSpec, Error> {
    serde_json::from_value(value.clone()).map_err(|e| Error::Codec(e.to_string()))
}

pub fn encode_status(status: &AwsProviderStatus) -> Result<Value, Error> {
    serde_json::to_value(status).map_err(|e| Error::Codec(e.to_string()))
}

pub fn decode_status(value: &Value) -> Result<AwsProviderStatus, Error> {
    serde_json::from_value(value.clone()).map_err(|e| Error::Codec(e.to_string()))
}

/// Translates decoded statements into an AWS IAM policy document JSON
/// string, suitable for `PutUserPolicy`.
pub fn statements_to_policy_document(spec: &AwsProviderSpec) -> Result<String, Error> {
    let statements: Vec<Value> = spec
        .statement_entries
        .iter()
        .map(|s| {
            serde_json::json!({
                "Effect": s.effect,
                "Action": s.action,
                "Resource": s.resource,
            })
        })
        .collect();
    let document = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": statements,
    });
    serde_json::to_string(&document).map_err(|e| Error::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> AwsProviderSpec {
        AwsProviderSpec {
            statement_entries: vec![StatementEntry {
                effect: "Allow".to_owned(),
                action: vec!["s3:GetObject".to_owned(), "s3:PutObject".to_owned()],
                resource: vec!["arn:aws:s3:::my-bucket/*".to_owned()],
            }],
        }
    }

    #[test]
    fn spec_round_trips_through_json() {
        let spec = sample_spec();
        let encoded = serde_json::to_value(&spec).unwrap();
        let decoded = decode_spec(&encoded).unwrap();
        assert_eq!(spec, decoded);
    }

    #[test]
    fn status_round_trips_through_codec() {
        let status = AwsProviderStatus {
            user: "testcluster-openshift-component-a".to_owned(),
            policy: "testcluster-openshift-component-a-policy".to_owned(),
        };
        let encoded = encode_status(&status).unwrap();
        let decoded = decode_status(&encoded).unwrap();
        assert_eq!(status, decoded);
    }

    #[test]
    fn rejects_malformed_spec() {
        let bad = serde_json::json!({ "notStatements": [] });
        assert!(decode_spec(&bad).is_err());
    }

    #[test]
    fn policy_document_carries_every_statement() {
        let spec = sample_spec();
        let doc = statements_to_policy_document(&spec).unwrap();
        let parsed: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(parsed["Statement"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["Statement"][0]["Effect"], "Allow");
    }
}
