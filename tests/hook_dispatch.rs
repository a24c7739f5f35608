use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::Method;
use serde_json::{json, Value};

use feedhook::{
    Exchange, Hook, HookCatalog, HookDispatcher, HookError, HookRegistry, RequestContext,
    ResourceConfig, ResourcePath, SingletonSpec, HOOKS_GROUP,
};

#[derive(Default)]
struct Recorder {
    calls: AtomicUsize,
}

impl Hook for Recorder {
    fn supports(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn hook(
        &self,
        _exchange: &mut Exchange,
        ctx: &mut RequestContext,
        args: &Value,
        conf_args: Option<&Value>,
    ) -> Result<(), HookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(args, &json!({"per": "call"}));
        assert_eq!(conf_args, Some(&json!({"static": true})));
        assert!(*ctx.method() == Method::PATCH);
        Ok(())
    }
}

struct Exploding;

impl Hook for Exploding {
    fn supports(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn hook(&self, _: &mut Exchange, _: &mut RequestContext, _: &Value, _: Option<&Value>) -> Result<(), HookError> {
        Err(HookError::execution("exploded"))
    }
}

struct Panicking;

impl Hook for Panicking {
    fn supports(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn hook(&self, _: &mut Exchange, _: &mut RequestContext, _: &Value, _: Option<&Value>) -> Result<(), HookError> {
        panic!("hook bug");
    }
}

fn request(hooks: Value) -> RequestContext {
    let config = ResourceConfig::from_value(ResourcePath::new("db", "orders"), json!({ "hooks": hooks }));
    RequestContext::new(Method::PATCH, Some(config))
}

fn catalog(recorder: &Arc<Recorder>) -> HookCatalog {
    let mut catalog = HookCatalog::with_builtins();
    let shared = Arc::clone(recorder);
    catalog.register("recorder", move |_| Ok(Arc::clone(&shared) as Arc<dyn Hook>));
    catalog.register("exploding", |_| Ok(Arc::new(Exploding) as Arc<dyn Hook>));
    catalog.register("panicking", |_| Ok(Arc::new(Panicking) as Arc<dyn Hook>));
    catalog
}

fn dispatcher(recorder: &Arc<Recorder>) -> HookDispatcher {
    let specs = vec![
        SingletonSpec::hook("recorder", "recorder", Some(json!({"static": true}))),
        SingletonSpec::hook("exploding", "exploding", None),
        SingletonSpec::hook("panicking", "panicking", None),
    ];
    HookDispatcher::new(Arc::new(HookRegistry::from_specs(&specs, &catalog(recorder))))
}

#[test]
fn failing_hook_yields_one_warning_and_later_hooks_still_run() {
    let recorder = Arc::new(Recorder::default());
    let mut ctx = request(json!([
        {"name": "exploding"},
        {"name": "recorder", "args": {"per": "call"}}
    ]));

    dispatcher(&recorder).dispatch(&mut Exchange::new("/db/orders"), &mut ctx);

    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.warnings(), ["Error executing hook 'exploding': exploded"]);
}

#[test]
fn missing_hook_is_named_in_the_warning() {
    let recorder = Arc::new(Recorder::default());
    let mut ctx = request(json!([{"name": "nobody"}]));

    dispatcher(&recorder).dispatch(&mut Exchange::new("/db/orders"), &mut ctx);

    assert_eq!(
        ctx.warnings(),
        ["Cannot find singleton 'nobody' in singleton group 'hooks'"]
    );
}

#[test]
fn panicking_hook_is_contained() {
    let recorder = Arc::new(Recorder::default());
    let mut ctx = request(json!([
        {"name": "panicking"},
        {"name": "recorder", "args": {"per": "call"}}
    ]));

    dispatcher(&recorder).dispatch(&mut Exchange::new("/db/orders"), &mut ctx);

    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.warnings(), ["Error executing hook 'panicking': hook bug"]);
}

#[test]
fn declared_order_is_kept() {
    let mut registry = HookRegistry::new();
    registry.insert(HOOKS_GROUP, "a", Arc::new(Exploding), None);
    registry.insert(HOOKS_GROUP, "b", Arc::new(Exploding), None);
    let dispatcher = HookDispatcher::new(Arc::new(registry));

    let mut ctx = request(json!([{"name": "b"}, {"name": "a"}]));
    dispatcher.dispatch(&mut Exchange::new("/"), &mut ctx);

    assert_eq!(
        ctx.warnings(),
        [
            "Error executing hook 'b': exploded",
            "Error executing hook 'a': exploded"
        ]
    );
}

#[test]
fn response_header_builtin_sets_headers() {
    let specs = vec![SingletonSpec::hook(
        "cors",
        "response_header",
        Some(json!({"headers": {"access-control-allow-origin": "*"}})),
    )];
    let dispatcher = HookDispatcher::new(Arc::new(HookRegistry::from_specs(&specs, &HookCatalog::with_builtins())));

    let mut ex = Exchange::new("/db/orders");
    let mut ctx = request(json!([{"name": "cors", "args": {"headers": {"x-served-by": "feedhook"}}}]));
    dispatcher.dispatch(&mut ex, &mut ctx);

    assert!(ctx.warnings().is_empty());
    assert_eq!(ex.response().headers()["access-control-allow-origin"], "*");
    assert_eq!(ex.response().headers()["x-served-by"], "feedhook");
}
