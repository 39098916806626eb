//! Reconciliation of client breakpoint requests with the runtime.
//!
//! The client sends the complete breakpoint list of one source file at a
//! time. Each batch replaces everything previously set for that file.
//! Files the runtime has not loaded yet are remembered as pending and
//! retried whenever new scripts appear; the retry reuses the ids the
//! client already knows, so verification shows up as a `changed` event on
//! the original breakpoint.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use swfdap_core::{ContextId, FileId, Location, NativeSession, SourceFile, MAIN_CONTEXT};
use swfdap_protocol::{Breakpoint, SourceBreakpoint};

use crate::source::SourceMapper;

/// Logpoint and condition data of one verified breakpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointExtras {
    pub location: Location,
    pub condition: Option<String>,
    pub log_message: Option<String>,
}

#[derive(Debug, Clone)]
struct PendingBreakpoints {
    path: String,
    breakpoints: Vec<SourceBreakpoint>,
    /// Id counter value when the batch was first handled.
    id_start: i64,
}

/// Outcome of one `setBreakpoints` batch.
#[derive(Debug, Clone, Default)]
pub struct BreakpointBatch {
    /// One entry per requested breakpoint, in request order.
    pub breakpoints: Vec<Breakpoint>,
    /// Whether the runtime knows the file.
    pub found: bool,
    /// Native failures worth showing to the user.
    pub diagnostics: Vec<String>,
}

/// Breakpoints re-resolved by [`BreakpointReconciler::refresh_pending`].
#[derive(Debug, Clone, Default)]
pub struct PendingRefresh {
    pub changed: Vec<Breakpoint>,
    pub diagnostics: Vec<String>,
}

#[derive(Debug)]
pub struct BreakpointReconciler {
    pending: BTreeMap<String, PendingBreakpoints>,
    extras: HashMap<String, Vec<BreakpointExtras>>,
    next_id: i64,
    source_extensions: Vec<String>,
}

impl Default for BreakpointReconciler {
    fn default() -> Self {
        Self::new(vec!["as".into(), "mxml".into(), "hx".into()])
    }
}

/// Canonical form used to compare client and runtime paths: forward
/// slashes, `.` and `..` folded, lowercase.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    let normalized = if absolute { format!("/{joined}") } else { joined };
    normalized.to_lowercase()
}

/// Whether a runtime path names the client file `normalized`, either
/// directly or through the SDK remapping.
fn same_path(sources: &SourceMapper, runtime_path: &str, normalized: &str) -> bool {
    normalize_path(runtime_path) == normalized
        || normalize_path(&sources.transform_path(runtime_path)) == normalized
}

impl BreakpointReconciler {
    pub fn new(source_extensions: Vec<String>) -> Self {
        Self {
            pending: BTreeMap::new(),
            extras: HashMap::new(),
            next_id: 1,
            source_extensions: source_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn is_supported(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.source_extensions.iter().any(|s| *s == ext))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_paths(&self) -> Vec<String> {
        self.pending.values().map(|p| p.path.clone()).collect()
    }

    /// Replaces the breakpoints of `path` with `requested`.
    pub fn set_breakpoints(
        &mut self,
        native: Option<&dyn NativeSession>,
        workers: &[ContextId],
        sources: &SourceMapper,
        path: &str,
        requested: &[SourceBreakpoint],
    ) -> BreakpointBatch {
        let id_start = self.next_id;
        let batch = self.apply(native, workers, sources, path, requested);
        let key = normalize_path(path);
        if batch.found {
            self.pending.remove(&key);
        } else if self.is_supported(path) {
            debug!(path, count = requested.len(), "breakpoints pending until the script loads");
            self.pending.insert(
                key,
                PendingBreakpoints {
                    path: path.to_string(),
                    breakpoints: requested.to_vec(),
                    id_start,
                },
            );
        }
        batch
    }

    /// Retries every pending batch with its original ids. Every breakpoint
    /// of a batch whose file is now known is reported as changed; a batch
    /// stays pending until one of its breakpoints verifies.
    pub fn refresh_pending(
        &mut self,
        native: Option<&dyn NativeSession>,
        workers: &[ContextId],
        sources: &SourceMapper,
    ) -> PendingRefresh {
        let mut refresh = PendingRefresh::default();
        if self.pending.is_empty() {
            return refresh;
        }
        let saved_id = self.next_id;
        let pending = std::mem::take(&mut self.pending);
        for (key, entry) in pending {
            self.next_id = entry.id_start;
            let batch = self.apply(native, workers, sources, &entry.path, &entry.breakpoints);
            refresh.diagnostics.extend(batch.diagnostics);
            let verified = batch.breakpoints.iter().any(|b| b.verified);
            if batch.found {
                refresh.changed.extend(batch.breakpoints);
            }
            if verified {
                debug!(path = %entry.path, "pending breakpoints resolved");
            } else {
                self.pending.insert(key, entry);
            }
        }
        self.next_id = saved_id;
        refresh
    }

    /// Extras of the verified breakpoint at `file_id:line` in `context`,
    /// if any. File ids are only unique within one context.
    pub fn find_extras(
        &self,
        context: ContextId,
        file_id: FileId,
        line: u32,
    ) -> Option<&BreakpointExtras> {
        self.extras.values().flatten().find(|e| {
            e.location.context_id == context
                && e.location.file_id == file_id
                && e.location.line == line
        })
    }

    fn find_file(
        &self,
        native: &dyn NativeSession,
        workers: &[ContextId],
        sources: &SourceMapper,
        normalized: &str,
        diagnostics: &mut Vec<String>,
    ) -> Option<SourceFile> {
        for context in std::iter::once(MAIN_CONTEXT).chain(workers.iter().copied()) {
            let files = match native.source_files(context) {
                Ok(files) => files,
                Err(e) => {
                    warn!(context, error = %e, "failed to list source files");
                    diagnostics.push(format!("Failed to list source files of context {context}: {e}"));
                    continue;
                }
            };
            let found = files
                .into_iter()
                .find(|f| same_path(sources, &f.full_path, normalized));
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn clear_file(
        &self,
        native: &dyn NativeSession,
        sources: &SourceMapper,
        normalized: &str,
        file: Option<&SourceFile>,
        diagnostics: &mut Vec<String>,
    ) {
        let existing = match native.breakpoints() {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "failed to list breakpoints");
                diagnostics.push(format!("Failed to list breakpoints: {e}"));
                return;
            }
        };
        for location in existing {
            let same_file = match &location.file {
                Some(f) => same_path(sources, &f.full_path, normalized),
                None => file.is_some_and(|f| f.id == location.file_id),
            };
            if !same_file {
                continue;
            }
            if let Err(e) = native.clear_breakpoint(&location) {
                warn!(line = location.line, error = %e, "failed to clear breakpoint");
                diagnostics.push(format!("Failed to clear breakpoint at line {}: {e}", location.line));
            }
        }
    }

    fn set_native(
        native: &dyn NativeSession,
        workers: &[ContextId],
        file_id: FileId,
        line: u32,
        diagnostics: &mut Vec<String>,
    ) -> Option<Location> {
        for context in std::iter::once(MAIN_CONTEXT).chain(workers.iter().copied()) {
            match native.set_breakpoint(context, file_id, line) {
                Ok(Some(location)) => return Some(location),
                Ok(None) => {}
                Err(e) => {
                    warn!(context, line, error = %e, "failed to set breakpoint");
                    diagnostics.push(format!("Failed to set breakpoint at line {line}: {e}"));
                }
            }
        }
        None
    }

    fn apply(
        &mut self,
        native: Option<&dyn NativeSession>,
        workers: &[ContextId],
        sources: &SourceMapper,
        path: &str,
        requested: &[SourceBreakpoint],
    ) -> BreakpointBatch {
        let normalized = normalize_path(path);
        let supported = self.is_supported(path);
        let mut diagnostics = Vec::new();

        let file = native
            .and_then(|n| self.find_file(n, workers, sources, &normalized, &mut diagnostics));
        if let Some(native) = native {
            self.clear_file(native, sources, &normalized, file.as_ref(), &mut diagnostics);
        }
        self.extras.remove(&normalized);

        let source = file.as_ref().map(|f| sources.to_source(f));
        let mut extras = Vec::new();
        let mut breakpoints = Vec::with_capacity(requested.len());
        for request in requested {
            let id = self.next_id;
            self.next_id += 1;

            let location = match (native, &file, u32::try_from(request.line)) {
                (Some(native), Some(file), Ok(line)) if supported => {
                    Self::set_native(native, workers, file.id, line, &mut diagnostics)
                }
                _ => None,
            };
            let line = location
                .as_ref()
                .map(|l| i64::from(l.line))
                .unwrap_or(request.line);
            if let Some(location) = location.as_ref() {
                if request.condition.is_some() || request.log_message.is_some() {
                    extras.push(BreakpointExtras {
                        location: location.clone(),
                        condition: request.condition.clone().filter(|c| !c.trim().is_empty()),
                        log_message: request.log_message.clone(),
                    });
                }
            }
            breakpoints.push(Breakpoint {
                id: Some(id),
                verified: location.is_some(),
                message: None,
                source: source.clone(),
                line: Some(line),
                column: None,
            });
        }
        if !extras.is_empty() {
            self.extras.insert(normalized, extras);
        }

        BreakpointBatch {
            breakpoints,
            found: file.is_some(),
            diagnostics,
        }
    }
}
