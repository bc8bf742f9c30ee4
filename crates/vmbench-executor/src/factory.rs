//! Backend factory
//!
//! Enumerates the fixed, ordered set of backend configurations a benchmark
//! run iterates over, each exposed as a display name plus a lazy
//! constructor. Constructing one at a time bounds resource usage to a
//! single live backend.

use crate::error::ExecutorError;
use crate::executor::Executor;
use crate::local::LocalExecutor;
use crate::vm::{VmConfig, VmExecutor};
use tokio_util::sync::CancellationToken;

/// One named backend configuration, constructed on demand
pub struct BackendSpec {
    name: String,
    kind: BackendKind,
}

enum BackendKind {
    Local,
    Vm { extra_run_args: Vec<&'static str> },
}

impl BackendSpec {
    /// Display name for logs and result tables
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct the backend
    ///
    /// For VM variants this provisions, boots and connects, which can take
    /// a while and can fail; the local variant is infallible in practice.
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        image: &str,
    ) -> Result<Box<dyn Executor>, ExecutorError> {
        match &self.kind {
            BackendKind::Local => Ok(Box::new(LocalExecutor::new())),
            BackendKind::Vm { extra_run_args } => {
                let config = VmConfig::new(image).with_run_args(extra_run_args.iter().copied());
                Ok(Box::new(VmExecutor::new(cancel, config).await?))
            }
        }
    }
}

/// The default benchmark matrix: local first, then the VM backend with
/// each documented disk-option variant
#[must_use]
pub fn default_backends() -> Vec<BackendSpec> {
    vec![
        BackendSpec {
            name: "local".to_string(),
            kind: BackendKind::Local,
        },
        BackendSpec {
            name: "vm".to_string(),
            kind: BackendKind::Vm {
                extra_run_args: vec![],
            },
        },
        BackendSpec {
            name: "vm (--root-disk-opts=\"sync=none\")".to_string(),
            kind: BackendKind::Vm {
                extra_run_args: vec!["--root-disk-opts", "sync=none"],
            },
        },
        BackendSpec {
            name: "vm (--root-disk-opts=\"caching=cached\")".to_string(),
            kind: BackendKind::Vm {
                extra_run_args: vec!["--root-disk-opts", "caching=cached"],
            },
        },
        BackendSpec {
            name: "vm (--root-disk-opts=\"sync=none,caching=cached\")".to_string(),
            kind: BackendKind::Vm {
                extra_run_args: vec!["--root-disk-opts", "sync=none,caching=cached"],
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_comes_first() {
        let backends = default_backends();
        assert_eq!(backends.len(), 5);
        assert_eq!(backends[0].name(), "local");
        assert_eq!(backends[1].name(), "vm");
    }

    #[tokio::test]
    async fn local_builds_and_runs_through_the_trait_object() {
        let cancel = CancellationToken::new();
        let backends = default_backends();
        let mut local = backends[0].build(&cancel, "unused-image").await.unwrap();
        assert_eq!(local.name(), "local");

        let output = local.run(&cancel, "echo \"this is a test\"").await.unwrap();
        assert_eq!(output, b"this is a test\n");

        local.close().await.unwrap();
    }
}
