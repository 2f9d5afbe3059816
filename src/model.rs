//! Classifier model loading and process-wide hot-reload handle.
//!
//! The model is a serialized ONNX classifier exposing
//! `predict_proba(feature_vector_1x6) -> [p_chest, p_falsetto]`. It is loaded
//! with `tract-onnx` (the pack's pure-Rust inference backend, mirroring the
//! teacher's sibling pitch-engine crate's ML stack) and held behind an
//! `ArcSwapOption` so a reader always observes an intact model (old or new)
//! while a reloader swaps in a fresh one — no locks inside an invocation
//! (spec.md §5).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use arc_swap::ArcSwapOption;
use once_cell::sync::Lazy;
use tract_onnx::prelude::*;

use crate::error::ModelError;
use crate::features::FeatureVector;

type TractPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded classifier model, immutable once constructed.
pub struct ClassifierModel {
    plan: TractPlan,
}

impl ClassifierModel {
    /// Load an ONNX model from a filesystem path.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound { path: path.display().to_string() });
        }
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| ModelError::LoadFailed { reason: e.to_string() })?
            .into_optimized()
            .map_err(|e| ModelError::LoadFailed { reason: e.to_string() })?
            .into_runnable()
            .map_err(|e| ModelError::LoadFailed { reason: e.to_string() })?;
        Ok(Self { plan })
    }

    /// Run `predict_proba` on a single feature vector, returning
    /// `(p_chest, p_falsetto)`.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<(f32, f32), ModelError> {
        let array = ndarray::Array2::from_shape_vec((1, 6), features.as_array().to_vec())
            .map_err(|e| ModelError::InferenceFailed { reason: e.to_string() })?;
        let input: Tensor = array.into_dyn().into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| ModelError::InferenceFailed { reason: e.to_string() })?;

        let output = outputs
            .first()
            .ok_or_else(|| ModelError::InferenceFailed { reason: "model returned no output".into() })?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| ModelError::InferenceFailed { reason: e.to_string() })?;
        let flat: Vec<f32> = view.iter().copied().collect();
        if flat.len() < 2 {
            return Err(ModelError::InferenceFailed {
                reason: format!("expected 2 posteriors, got {}", flat.len()),
            });
        }
        Ok((flat[0], flat[1]))
    }
}

/// Process-wide, hot-reloadable classifier handle. `None` means "no model
/// available" — callers fall back to the rule engine.
pub struct ModelHandle {
    path: PathBuf,
    mtime: ArcSwapOption<SystemTime>,
    model: ArcSwapOption<ClassifierModel>,
}

impl ModelHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mtime: ArcSwapOption::from(None),
            model: ArcSwapOption::from(None),
        }
    }

    /// Load (or reload, if the file's mtime has advanced) and return the
    /// current model, if any. Safe to call before every inference: it is a
    /// cheap `stat()` when nothing has changed.
    pub fn current(&self) -> Option<std::sync::Arc<ClassifierModel>> {
        match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => {
                let cached = self.mtime.load_full();
                let stale = match cached.as_deref() {
                    Some(cached_mtime) => mtime > *cached_mtime,
                    None => true,
                };
                if stale {
                    self.reload(mtime);
                }
            }
            Err(_) => {
                // File missing or unreadable; keep whatever we last had (possibly None).
            }
        }
        self.model.load_full()
    }

    fn reload(&self, mtime: SystemTime) {
        match ClassifierModel::load(&self.path) {
            Ok(model) => {
                self.model.store(Some(std::sync::Arc::new(model)));
                self.mtime.store(Some(std::sync::Arc::new(mtime)));
                log::info!("classifier model (re)loaded from {}", self.path.display());
            }
            Err(err) => {
                log::warn!("classifier model load failed, continuing without model: {err}");
            }
        }
    }
}

/// Lazily-initialized handle pointing at a configurable model path. Empty by
/// default (no model file configured); `set_model_path` rebinds it.
pub static GLOBAL_MODEL: Lazy<ArcSwapOption<ModelHandle>> = Lazy::new(|| ArcSwapOption::from(None));

/// Configure (or reconfigure) the process-wide model path. Passing `None`
/// disables the ML path entirely (rules-only).
pub fn set_model_path(path: Option<PathBuf>) {
    GLOBAL_MODEL.store(path.map(|p| std::sync::Arc::new(ModelHandle::new(p))));
}

/// Fetch the currently active model, if configured and loadable.
pub fn current_model() -> Option<std::sync::Arc<ClassifierModel>> {
    GLOBAL_MODEL.load_full().as_ref().and_then(|handle| handle.current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_path_yields_none() {
        let handle = ModelHandle::new("/nonexistent/path/model.onnx");
        assert!(handle.current().is_none());
    }

    #[test]
    fn unset_global_model_yields_none() {
        set_model_path(None);
        assert!(current_model().is_none());
    }
}
