//! Build manifest for generated adapters
//!
//! A manifest records which adapters a run produced, the interface method
//! each one implements and a SHA-256 of every class file, so a build can be
//! checked for reproducibility. It deliberately carries no timestamp: two
//! runs over the same inputs produce byte-identical manifests.
//!
//! ## File
//!
//! The CLI writes the manifest next to the class files as
//! `samforge-manifest.json`.

use crate::SynthesisStats;
use crate::adapter::GeneratedTypeArtifact;
use crate::descriptor::TargetInterfaceDescriptor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default manifest file name
pub const MANIFEST_FILE: &str = "samforge-manifest.json";

/// Manifest for one synthesis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Schema version
    pub version: String,

    /// Namespace the adapters were prepared in
    pub namespace: String,

    /// Internal name of the generic callable interface
    pub callable: String,

    /// Generated adapters, in the order they were prepared
    pub adapters: Vec<AdapterEntry>,

    /// Tool information
    pub tool: ToolInfo,
}

/// Descriptor for a class file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Binary class name
    pub name: String,

    /// SHA-256 hash (hex encoded)
    pub hash: String,

    /// Size in bytes
    pub size: u64,
}

/// One generated adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterEntry {
    pub artifact: ArtifactDescriptor,

    /// Binary name of the implemented interface
    pub interface: String,

    /// Name of the implemented method
    pub method: String,

    /// Method descriptor
    pub descriptor: String,

    pub stats: SynthesisStats,
}

/// Tool information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Builder for [`ArtifactManifest`]
pub struct ManifestBuilder {
    namespace: String,
    callable: String,
    adapters: Vec<AdapterEntry>,
    tool_name: String,
    tool_version: String,
}

impl ManifestBuilder {
    pub fn new(tool_name: impl Into<String>, tool_version: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            callable: "clojure/lang/IFn".to_string(),
            adapters: Vec::new(),
            tool_name: tool_name.into(),
            tool_version: tool_version.into(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn callable(mut self, callable: impl Into<String>) -> Self {
        self.callable = callable.into();
        self
    }

    /// Record a generated adapter
    pub fn add_adapter(
        mut self,
        artifact: &GeneratedTypeArtifact,
        target: &TargetInterfaceDescriptor,
        stats: &SynthesisStats,
    ) -> Self {
        self.adapters.push(AdapterEntry {
            artifact: ArtifactDescriptor {
                name: artifact.binary_name(),
                hash: compute_sha256(&artifact.bytes),
                size: artifact.bytes.len() as u64,
            },
            interface: target.name.clone(),
            method: target.method_name.clone(),
            descriptor: target.signature.descriptor(),
            stats: stats.clone(),
        });
        self
    }

    pub fn build(self) -> ArtifactManifest {
        ArtifactManifest {
            version: "1.0".to_string(),
            namespace: self.namespace,
            callable: self.callable,
            adapters: self.adapters,
            tool: ToolInfo {
                name: self.tool_name,
                version: self.tool_version,
            },
        }
    }
}

impl ArtifactManifest {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check a class file against the recorded hash for `name`
    ///
    /// Returns `None` when the manifest has no entry for `name`.
    pub fn verify(&self, name: &str, bytes: &[u8]) -> Option<bool> {
        self.adapters
            .iter()
            .find(|entry| entry.artifact.name == name)
            .map(|entry| entry.artifact.hash == compute_sha256(bytes))
    }
}

/// Compute SHA-256 hash of bytes
pub(crate) fn compute_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MethodSignature;

    fn sample() -> (GeneratedTypeArtifact, TargetInterfaceDescriptor, SynthesisStats) {
        let artifact = GeneratedTypeArtifact {
            name: "user/LambdaFactory$java$lang$Runnable".to_string(),
            bytes: b"class bytes".to_vec(),
            constant_pool_count: 1,
        };
        let target = TargetInterfaceDescriptor::new(
            "java.lang.Runnable",
            "run",
            MethodSignature::parse("()V").unwrap(),
        );
        let stats = SynthesisStats {
            artifact_size: artifact.bytes.len(),
            ..Default::default()
        };
        (artifact, target, stats)
    }

    #[test]
    fn test_compute_sha256() {
        let hash = compute_sha256(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_manifest_builder() {
        let (artifact, target, stats) = sample();
        let manifest = ManifestBuilder::new("samforge", "0.1.0")
            .namespace("user")
            .add_adapter(&artifact, &target, &stats)
            .build();

        assert_eq!(manifest.tool.name, "samforge");
        assert_eq!(manifest.callable, "clojure/lang/IFn");
        assert_eq!(manifest.adapters.len(), 1);
        let entry = &manifest.adapters[0];
        assert_eq!(entry.artifact.name, "user.LambdaFactory$java$lang$Runnable");
        assert_eq!(entry.artifact.size, 11);
        assert_eq!(entry.descriptor, "()V");
    }

    #[test]
    fn test_manifest_json_roundtrip() {
        let (artifact, target, stats) = sample();
        let manifest = ManifestBuilder::new("samforge", "0.1.0")
            .add_adapter(&artifact, &target, &stats)
            .build();

        let json = manifest.to_json().unwrap();
        assert_eq!(ArtifactManifest::from_json(&json).unwrap(), manifest);
    }

    #[test]
    fn test_manifest_is_reproducible() {
        let (artifact, target, stats) = sample();
        let build = || {
            ManifestBuilder::new("samforge", "0.1.0")
                .add_adapter(&artifact, &target, &stats)
                .build()
                .to_json()
                .unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_verify() {
        let (artifact, target, stats) = sample();
        let manifest = ManifestBuilder::new("samforge", "0.1.0")
            .add_adapter(&artifact, &target, &stats)
            .build();
        let name = artifact.binary_name();
        assert_eq!(manifest.verify(&name, &artifact.bytes), Some(true));
        assert_eq!(manifest.verify(&name, b"tampered"), Some(false));
        assert_eq!(manifest.verify("other.Name", &artifact.bytes), None);
    }
}
