//! Submission entries, compile results and diagnostic hints

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{buffer_bytes, CompilerKind, CompilerSettings};
use crate::infra::PortalError;

/// Lifecycle of one `(contract, verifier)` submission entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Idle => "idle",
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Success => "success",
            SubmissionStatus::Error => "error",
        }
    }
}

/// Outcome reported by a verifier backend compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileOutcome {
    Similar,
    NotSimilar,
    CompileError,
    UnknownError,
}

impl CompileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CompileOutcome::CompileError | CompileOutcome::UnknownError)
    }
}

/// `compileResult` object of a `/source` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub result: CompileOutcome,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub func_cmd: Option<String>,
    #[serde(default)]
    pub compiler_settings: serde_json::Value,
}

/// Body of a successful `/source` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub compile_result: CompileResult,
    #[serde(
        default,
        with = "buffer_bytes::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub msg_cell: Option<Vec<u8>>,
}

/// Body of a `/sign` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(with = "buffer_bytes")]
    pub message_cell: Vec<u8>,
}

/// Body of a successful `/sign` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    #[serde(with = "buffer_bytes")]
    pub msg_cell: Vec<u8>,
}

/// Remediation hints shown after a failed or mismatching compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Hint {
    StdlibMissing,
    StdlibOrder,
    EntrypointMissing,
    CompilerVersion,
    RequiredFiles,
    FileOrder,
    NotSimilar,
    SupportGroup,
}

impl Hint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hint::StdlibMissing => "STDLIB_MISSING",
            Hint::StdlibOrder => "STDLIB_ORDER",
            Hint::EntrypointMissing => "ENTRYPOINT_MISSING",
            Hint::CompilerVersion => "COMPILER_VERSION",
            Hint::RequiredFiles => "REQUIRED_FILES",
            Hint::FileOrder => "FILE_ORDER",
            Hint::NotSimilar => "NOT_SIMILAR",
            Hint::SupportGroup => "SUPPORT_GROUP",
        }
    }
}

/// A user-selected source file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUpload {
    pub name: String,
    /// Folder path relative to the bundle root, empty for top level
    pub folder: Option<String>,
    pub content: Vec<u8>,
    pub include_in_command: bool,
    pub is_entrypoint: bool,
    pub is_stdlib: bool,
    pub has_include_directives: bool,
}

impl SourceUpload {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            folder: None,
            content: content.into(),
            include_in_command: true,
            is_entrypoint: false,
            is_stdlib: false,
            has_include_directives: false,
        }
    }

    pub fn entrypoint(mut self) -> Self {
        self.is_entrypoint = true;
        self
    }

    pub fn stdlib(mut self) -> Self {
        self.is_stdlib = true;
        self
    }

    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Multipart field name: `folder/name` or just `name`.
    pub fn field_name(&self) -> String {
        match self.folder.as_deref() {
            Some(folder) if !folder.is_empty() => format!("{folder}/{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// Per-file flags inside the submission manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSource {
    pub include_in_command: bool,
    pub is_entrypoint: bool,
    #[serde(rename = "isStdLib")]
    pub is_stdlib: bool,
    pub has_include_directives: bool,
    pub folder: Option<String>,
}

/// `json` part of a `/source` multipart submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionManifest {
    pub compiler: CompilerKind,
    pub compiler_settings: serde_json::Value,
    pub known_contract_address: String,
    pub known_contract_hash: String,
    pub sources: Vec<ManifestSource>,
    pub sender_address: String,
}

impl SubmissionManifest {
    pub fn build(
        address: &str,
        code_hash: &str,
        settings: &CompilerSettings,
        files: &[SourceUpload],
        sender: &str,
    ) -> Self {
        Self {
            compiler: settings.kind(),
            compiler_settings: settings.settings_json(),
            known_contract_address: address.to_string(),
            known_contract_hash: code_hash.to_string(),
            sources: files
                .iter()
                .map(|f| ManifestSource {
                    include_in_command: f.include_in_command,
                    is_entrypoint: f.is_entrypoint,
                    is_stdlib: f.is_stdlib,
                    has_include_directives: f.has_include_directives,
                    folder: f.folder.clone(),
                })
                .collect(),
            sender_address: sender.to_string(),
        }
    }
}

/// Result of one verifier's submission round.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub compile_result: CompileResult,
    /// Fully countersigned message, set only once the quorum is reached
    pub signed_message: Option<Vec<u8>>,
    pub hints: BTreeSet<Hint>,
    pub query_id: Option<u64>,
    /// Backends that signed, initiator first
    pub signers: Vec<String>,
    pub compile_status: Option<String>,
}

impl SubmissionResult {
    pub fn is_ready(&self) -> bool {
        self.signed_message.is_some()
    }
}

/// Keyed submission state for one `(contract, verifier)` pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmissionEntry {
    pub status: SubmissionStatus,
    pub is_loading: bool,
    pub error: Option<PortalError>,
    pub compile_status: Option<String>,
    pub data: Option<SubmissionResult>,
}

impl SubmissionEntry {
    pub fn signed_message(&self) -> Option<&[u8]> {
        self.data.as_ref()?.signed_message.as_deref()
    }
}

/// Entry of the `/latestVerified` feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestVerified {
    pub address: String,
    pub main_file: String,
    pub compiler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
