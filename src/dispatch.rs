//! Broadcasting hooks across a resolved plugin chain.
//!
//! Plugins are always called in chain order. A failing plugin stops the
//! broadcast: later plugins are not called for that event and the error is
//! returned to the caller, which aborts the generation call in progress.

use crate::plugin::{HookResult, Plugin, PluginError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// Every lifecycle hook a plugin can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    TemplateLoaded,
    BeginSite,
    SiteComplete,
    BeginGeneration,
    GenerationComplete,
    BeginNode,
    NodeComplete,
    BeginTextResource,
    BeginBinaryResource,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Hook::TemplateLoaded => "template_loaded",
            Hook::BeginSite => "begin_site",
            Hook::SiteComplete => "site_complete",
            Hook::BeginGeneration => "begin_generation",
            Hook::GenerationComplete => "generation_complete",
            Hook::BeginNode => "begin_node",
            Hook::NodeComplete => "node_complete",
            Hook::BeginTextResource => "begin_text_resource",
            Hook::BeginBinaryResource => "begin_binary_resource",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plugin hook failed during dispatch.
#[derive(Error, Debug)]
#[error("Plugin '{plugin}' failed in {hook}: {source}")]
pub struct HookError {
    pub plugin: String,
    pub hook: Hook,
    pub source: PluginError,
}

/// Call a notification hook on every plugin, in order.
pub fn notify<F>(plugins: &[Arc<dyn Plugin>], hook: Hook, mut call: F) -> Result<(), HookError>
where
    F: FnMut(&dyn Plugin) -> HookResult,
{
    for plugin in plugins {
        trace!(plugin = plugin.name(), %hook, "dispatch");
        call(plugin.as_ref()).map_err(|source| HookError {
            plugin: plugin.name().to_string(),
            hook,
            source,
        })?;
    }
    Ok(())
}

/// Thread a value through a content-transform hook.
///
/// Each plugin sees the value produced by the plugins before it. `Some`
/// replaces the running value; `None` leaves it as is.
pub fn transform<T, F>(
    plugins: &[Arc<dyn Plugin>],
    hook: Hook,
    initial: T,
    mut call: F,
) -> Result<T, HookError>
where
    F: FnMut(&dyn Plugin, &T) -> HookResult<Option<T>>,
{
    let mut value = initial;
    for plugin in plugins {
        trace!(plugin = plugin.name(), %hook, "dispatch");
        let replaced = call(plugin.as_ref(), &value).map_err(|source| HookError {
            plugin: plugin.name().to_string(),
            hook,
            source,
        })?;
        if let Some(next) = replaced {
            value = next;
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    /// Records the order it was notified in.
    struct Tagger {
        tag: &'static str,
        calls: Calls,
        fail: bool,
    }

    impl Plugin for Tagger {
        fn name(&self) -> &str {
            self.tag
        }

        fn begin_generation(&self) -> HookResult {
            self.calls.lock().unwrap().push(self.tag);
            if self.fail {
                return Err(PluginError::failed("boom"));
            }
            Ok(())
        }
    }

    fn chain(spec: &[(&'static str, bool)]) -> (Vec<Arc<dyn Plugin>>, Calls) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let plugins = spec
            .iter()
            .map(|&(tag, fail)| {
                Arc::new(Tagger {
                    tag,
                    calls: calls.clone(),
                    fail,
                }) as Arc<dyn Plugin>
            })
            .collect();
        (plugins, calls)
    }

    fn tag_text(plugin: &dyn Plugin, text: &String) -> HookResult<Option<String>> {
        Ok(Some(format!("{text}+{}", plugin.name())))
    }

    #[test]
    fn notify_calls_plugins_in_chain_order() {
        let (plugins, calls) = chain(&[("a", false), ("b", false), ("c", false)]);
        notify(&plugins, Hook::BeginGeneration, |p| p.begin_generation()).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn notify_stops_at_first_failure() {
        let (plugins, calls) = chain(&[("a", false), ("b", true), ("c", false)]);
        let err = notify(&plugins, Hook::BeginGeneration, |p| p.begin_generation()).unwrap_err();

        assert_eq!(err.plugin, "b");
        assert_eq!(err.hook, Hook::BeginGeneration);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(
            err.to_string(),
            "Plugin 'b' failed in begin_generation: boom"
        );
    }

    #[test]
    fn transform_threads_value_through_chain() {
        let (plugins, _) = chain(&[("a", false), ("b", false)]);
        let out = transform(&plugins, Hook::BeginTextResource, "x".to_string(), tag_text).unwrap();
        assert_eq!(out, "x+a+b");
    }

    #[test]
    fn transform_none_keeps_running_value() {
        let (plugins, _) = chain(&[("a", false), ("skip", false), ("c", false)]);
        let out = transform(&plugins, Hook::BeginTextResource, "x".to_string(), |p, text| {
            if p.name() == "skip" {
                Ok(None)
            } else {
                tag_text(p, text)
            }
        })
        .unwrap();
        assert_eq!(out, "x+a+c");
    }

    #[test]
    fn transform_error_names_plugin_and_hook() {
        let (plugins, _) = chain(&[("a", false), ("b", false)]);
        let err = transform(&plugins, Hook::BeginBinaryResource, vec![1u8], |p, _| {
            if p.name() == "b" {
                Err(PluginError::failed("bad bytes"))
            } else {
                Ok(None)
            }
        })
        .unwrap_err();
        assert_eq!(err.plugin, "b");
        assert_eq!(err.hook, Hook::BeginBinaryResource);
    }

    #[test]
    fn empty_chain_is_identity() {
        let out = transform(&[], Hook::BeginTextResource, "same".to_string(), tag_text).unwrap();
        assert_eq!(out, "same");
        notify(&[], Hook::BeginSite, |_| unreachable!()).unwrap();
    }

    #[test]
    fn hook_names() {
        assert_eq!(Hook::BeginTextResource.name(), "begin_text_resource");
        assert_eq!(Hook::SiteComplete.to_string(), "site_complete");
    }
}
