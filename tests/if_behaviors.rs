//! End-to-end behavior of the conditional bindings: materialization,
//! teardown, containerless regions, render callbacks, and preprocessing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use graft::{
    apply_bindings, set_provider, set_template_engine, BindError, BindingContext, BindingExpr,
    BindingOptions, MapBindingProvider, MarkerRole, Node, Observable, Template, TemplateEngine,
    Value,
};

/// Expression reading a view-model field off `$data`.
fn field_expr(name: &'static str) -> BindingExpr {
    Rc::new(move |ctx: &BindingContext| Ok(ctx.data().get(name)))
}

/// Expression handing back an observable cell, the way `if: someItem` refers
/// to a cell without unwrapping it.
fn cell_expr(cell: &Observable<Value>) -> BindingExpr {
    let cell = cell.clone();
    Rc::new(move |_: &BindingContext| Ok(Value::obs(&cell)))
}

#[test]
fn falsy_condition_removes_content_and_skips_descendant_bindings() {
    let provider = Rc::new(MapBindingProvider::new());
    let root = Node::element("div");
    let container = Node::element("div");
    let span = Node::element("span");
    container.append_child(&span);
    root.append_child(&container);

    provider.bind(&container, "if", field_expr("someItem"));

    let evaluations = Rc::new(Cell::new(0));
    let evals = evaluations.clone();
    provider.bind(
        &span,
        "text",
        Rc::new(move |ctx: &BindingContext| {
            evals.set(evals.get() + 1);
            Ok(ctx.data().get("someItem").get("nonExistentChildProp"))
        }),
    );
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([("someItem", Value::Null)]));
    apply_bindings(&root, &ctx).unwrap();

    assert_eq!(container.child_count(), 0);
    assert_eq!(evaluations.get(), 0, "descendant bindings must not run");
}

#[test]
fn truthy_condition_binds_content_regardless_of_installed_engine() {
    struct ExplodingEngine;
    impl TemplateEngine for ExplodingEngine {
        fn render(
            &self,
            _template: &Template,
            _ctx: &BindingContext,
        ) -> Result<Vec<Node>, BindError> {
            Err(BindError::Template("installed engine must not be invoked".into()))
        }
    }
    let previous = set_template_engine(Rc::new(ExplodingEngine));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    let span = Node::element("span");
    container.append_child(&span);

    provider.bind(&container, "if", field_expr("someItem"));
    provider.bind(
        &span,
        "text",
        Rc::new(|ctx: &BindingContext| Ok(ctx.data().get("someItem").get("existentChildProp"))),
    );
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([(
        "someItem",
        Value::object([("existentChildProp", Value::from("Child prop value"))]),
    )]));
    let result = apply_bindings(&container, &ctx);
    set_template_engine(previous);
    result.unwrap();

    assert_eq!(container.child_count(), 1);
    let rendered = container.child(0).unwrap();
    assert_eq!(rendered.tag(), Some("span"));
    assert_eq!(rendered.text_content(), "Child prop value");
    assert_ne!(rendered, span, "rendered content is a copy of the capture");
}

#[test]
fn truthy_to_truthy_change_leaves_nodes_untouched() {
    let some_item = Observable::new(Value::from("first value"));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    let span = Node::element("span");
    container.append_child(&span);

    provider.bind(&container, "if", cell_expr(&some_item));

    let evaluations = Rc::new(Cell::new(0i64));
    let evals = evaluations.clone();
    provider.bind(
        &span,
        "text",
        Rc::new(move |_: &BindingContext| {
            evals.set(evals.get() + 1);
            Ok(Value::from(evals.get()))
        }),
    );
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();

    assert_eq!(evaluations.get(), 1);
    assert_eq!(container.text_content(), "1");
    let rendered = container.child(0).unwrap();

    some_item.set(Value::from("different truthy value")).unwrap();

    assert_eq!(evaluations.get(), 1, "content must not re-bind");
    assert_eq!(container.child(0).unwrap(), rendered, "node identity preserved");
    assert_eq!(container.text_content(), "1");
}

#[test]
fn condition_toggles_presence_and_bindedness() {
    let some_item = Observable::new(Value::Undefined);

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    let span = Node::element("span");
    container.append_child(&span);

    provider.bind(&container, "if", cell_expr(&some_item));
    let item_for_text = some_item.clone();
    provider.bind(
        &span,
        "text",
        Rc::new(move |_: &BindingContext| {
            Ok(item_for_text.get().get("occasionallyExistentChildProp"))
        }),
    );
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();
    assert_eq!(container.child_count(), 0);

    some_item
        .set(Value::object([(
            "occasionallyExistentChildProp",
            Value::from("Child prop value"),
        )]))
        .unwrap();
    assert_eq!(container.child_count(), 1);
    assert_eq!(container.text_content(), "Child prop value");

    some_item.set(Value::Null).unwrap();
    assert_eq!(container.child_count(), 0);
}

#[test]
fn content_sees_the_outer_context_unchanged() {
    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    let span = Node::element("span");
    container.append_child(&span);

    provider.bind(&container, "if", Rc::new(|_| Ok(Value::Bool(true))));
    provider.bind(
        &span,
        "text",
        Rc::new(|ctx: &BindingContext| Ok(Value::from(ctx.parents().len() as i64))),
    );
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();

    // No scope was pushed: at the root, `$parents` stays empty inside the
    // conditional's content.
    assert_eq!(container.text_content(), "0");
}

#[test]
fn containerless_region_round_trips_through_markup() {
    let some_item = Observable::new(Value::Undefined);

    let provider = Rc::new(MapBindingProvider::new());
    let root = Node::element("div");
    root.append_child(&Node::text("hello "));
    let start = Node::region_start("ko if: someitem");
    root.append_child(&start);
    let span = Node::element("span");
    root.append_child(&span);
    root.append_child(&Node::region_end("/ko"));
    root.append_child(&Node::text(" goodbye"));

    provider.bind(&start, "if", cell_expr(&some_item));
    let item_for_text = some_item.clone();
    provider.bind(
        &span,
        "text",
        Rc::new(move |_: &BindingContext| {
            Ok(item_for_text.get().get("occasionallyexistentchildprop"))
        }),
    );
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&root, &ctx).unwrap();
    assert_eq!(
        root.inner_html(),
        "hello <!--ko if: someitem--><!--/ko--> goodbye"
    );

    some_item
        .set(Value::object([(
            "occasionallyexistentchildprop",
            Value::from("Child prop value"),
        )]))
        .unwrap();
    assert_eq!(
        root.inner_html(),
        "hello <!--ko if: someitem--><span>Child prop value</span><!--/ko--> goodbye"
    );

    some_item.set(Value::Undefined).unwrap();
    assert_eq!(
        root.inner_html(),
        "hello <!--ko if: someitem--><!--/ko--> goodbye"
    );
}

#[test]
fn nested_containerless_regions_toggle_independently() {
    let condition1 = Observable::new(Value::Bool(false));
    let condition2 = Observable::new(Value::Bool(true));

    let provider = Rc::new(MapBindingProvider::new());
    let root = Node::element("div");
    let outer_start = Node::region_start("ko if: condition1");
    let inner_start = Node::region_start("ko if: condition2");
    root.append_child(&outer_start);
    root.append_child(&Node::text("First is true"));
    root.append_child(&inner_start);
    root.append_child(&Node::text("Both are true"));
    root.append_child(&Node::region_end("/ko"));
    root.append_child(&Node::region_end("/ko"));

    provider.bind(&outer_start, "if", cell_expr(&condition1));
    provider.bind(&inner_start, "if", cell_expr(&condition2));
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&root, &ctx).unwrap();
    assert_eq!(root.inner_html(), "<!--ko if: condition1--><!--/ko-->");

    condition1.set(Value::Bool(true)).unwrap();
    assert_eq!(
        root.inner_html(),
        "<!--ko if: condition1-->First is true<!--ko if: condition2-->Both are true<!--/ko--><!--/ko-->"
    );

    condition2.set(Value::Bool(false)).unwrap();
    assert_eq!(
        root.inner_html(),
        "<!--ko if: condition1-->First is true<!--ko if: condition2--><!--/ko--><!--/ko-->"
    );

    condition1.set(Value::Bool(false)).unwrap();
    assert_eq!(root.inner_html(), "<!--ko if: condition1--><!--/ko-->");

    // Re-showing the outer region rebuilds the inner controller from fresh
    // copies; it picks up the inner condition's current state.
    condition1.set(Value::Bool(true)).unwrap();
    assert_eq!(
        root.inner_html(),
        "<!--ko if: condition1-->First is true<!--ko if: condition2--><!--/ko--><!--/ko-->"
    );

    condition2.set(Value::Bool(true)).unwrap();
    assert_eq!(
        root.inner_html(),
        "<!--ko if: condition1-->First is true<!--ko if: condition2-->Both are true<!--/ko--><!--/ko-->"
    );
}

#[test]
fn after_render_runs_once_and_writes_in_it_cause_no_update() {
    let callback_observable = Observable::new(Value::from(1i64));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    container.append_child(&Node::element("span"));

    let calls = Rc::new(Cell::new(0));
    let calls_cb = calls.clone();
    let cell_cb = callback_observable.clone();
    let options = BindingOptions {
        after_render: Some(Rc::new(move |nodes: &[Node], _data: &Value| {
            calls_cb.set(calls_cb.get() + 1);
            assert_eq!(nodes.len(), 1);
            // Reads here must not subscribe the region to the cell.
            let seen = cell_cb.get();
            let _ = seen.is_truthy();
        })),
        ..BindingOptions::default()
    };
    provider.bind_with(&container, "if", Rc::new(|_| Ok(Value::Bool(true))), options);
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();
    assert_eq!(calls.get(), 1);

    callback_observable.set(Value::from(2i64)).unwrap();
    assert_eq!(calls.get(), 1, "callback reads must stay inert");
    assert_eq!(container.child_count(), 1);
}

#[test]
fn after_render_skips_teardown_and_fires_again_on_rematerialization() {
    let condition = Observable::new(Value::Bool(true));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    container.append_child(&Node::element("span"));

    let calls = Rc::new(Cell::new(0));
    let calls_cb = calls.clone();
    let options = BindingOptions {
        after_render: Some(Rc::new(move |_: &[Node], _: &Value| {
            calls_cb.set(calls_cb.get() + 1);
        })),
        ..BindingOptions::default()
    };
    provider.bind_with(&container, "if", cell_expr(&condition), options);
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();
    assert_eq!(calls.get(), 1);

    condition.set(Value::Bool(false)).unwrap();
    assert_eq!(calls.get(), 1, "no callback on teardown");
    assert_eq!(container.child_count(), 0);

    condition.set(Value::Bool(true)).unwrap();
    assert_eq!(calls.get(), 2);
    assert_eq!(container.child_count(), 1);
}

#[test]
fn after_render_reports_preprocessed_nodes_in_document_order() {
    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    let open = Node::element("span");
    open.append_child(&Node::text("["));
    container.append_child(&open);
    container.append_child(&Node::text("$data.someText"));
    let close = Node::element("span");
    close.append_child(&Node::text("]"));
    container.append_child(&close);

    // Rewrites `$data.<field>` text nodes into a virtual text binding, the
    // kind of markup sugar a preprocessor exists for.
    let provider_for_preprocess = Rc::downgrade(&provider);
    provider.set_preprocessor(Rc::new(move |node: &Node| {
        let text = node.text_data()?;
        let field = text.strip_prefix("$data.")?.to_string();
        let parent = node.parent()?;

        let start = Node::region_start(&format!("ko text: {field}"));
        let end = Node::region_end("/ko");
        parent.insert_before(&start, Some(node));
        parent.insert_before(&end, Some(node));
        node.detach();

        if let Some(provider) = provider_for_preprocess.upgrade() {
            provider.bind(
                &start,
                "text",
                Rc::new(move |ctx: &BindingContext| Ok(ctx.data().get(&field))),
            );
        }
        Some(vec![start, end])
    }));

    let reported: Rc<RefCell<Vec<Node>>> = Rc::new(RefCell::new(Vec::new()));
    let reported_cb = reported.clone();
    let options = BindingOptions {
        after_render: Some(Rc::new(move |nodes: &[Node], _: &Value| {
            *reported_cb.borrow_mut() = nodes.to_vec();
        })),
        ..BindingOptions::default()
    };
    provider.bind_with(&container, "if", Rc::new(|_| Ok(Value::Bool(true))), options);
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([("someText", Value::from("hello"))]));
    apply_bindings(&container, &ctx).unwrap();

    let nodes = reported.borrow();
    assert_eq!(nodes.len(), 5, "markers and the bound text node are reported");
    assert_eq!(nodes[0].tag(), Some("span"));
    assert_eq!(nodes[1].marker_role(), MarkerRole::RegionStart);
    assert_eq!(nodes[2].text_data().as_deref(), Some("hello"));
    assert_eq!(nodes[3].marker_role(), MarkerRole::RegionEnd);
    assert_eq!(nodes[4].tag(), Some("span"));
    assert_eq!(container.text_content(), "[hello]");
}

#[test]
fn named_template_renders_through_the_installed_engine() {
    struct NamedFixtureEngine {
        renders: Rc<Cell<u32>>,
    }
    impl TemplateEngine for NamedFixtureEngine {
        fn render(
            &self,
            template: &Template,
            _ctx: &BindingContext,
        ) -> Result<Vec<Node>, BindError> {
            match template.name() {
                Some("greeting") => {
                    self.renders.set(self.renders.get() + 1);
                    let span = Node::element("span");
                    span.append_child(&Node::text("rendered by name"));
                    Ok(vec![span])
                }
                other => Err(BindError::Template(format!("unknown template {other:?}"))),
            }
        }
    }

    let renders = Rc::new(Cell::new(0));
    let previous = set_template_engine(Rc::new(NamedFixtureEngine {
        renders: renders.clone(),
    }));

    let condition = Observable::new(Value::Bool(true));
    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    container.append_child(&Node::text("authored placeholder"));

    let options = BindingOptions {
        template_name: Some("greeting".to_string()),
        ..BindingOptions::default()
    };
    provider.bind_with(&container, "if", cell_expr(&condition), options);
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();

    // The authored child is discarded in favor of the named template.
    assert_eq!(container.text_content(), "rendered by name");
    assert_eq!(renders.get(), 1);

    condition.set(Value::Bool(false)).unwrap();
    assert_eq!(container.child_count(), 0);
    assert_eq!(renders.get(), 1, "no engine call while unmaterialized");

    condition.set(Value::Bool(true)).unwrap();
    assert_eq!(container.text_content(), "rendered by name");
    assert_eq!(renders.get(), 2);

    set_template_engine(previous);
}

#[test]
fn every_falsy_coercion_clears_a_materialized_region() {
    let cell = Observable::new(Value::Bool(true));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    container.append_child(&Node::element("span"));
    provider.bind(&container, "if", cell_expr(&cell));
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();

    let falsy_values = [
        Value::Undefined,
        Value::Null,
        Value::Bool(false),
        Value::Number(0.0),
        Value::from(""),
    ];
    for falsy in falsy_values {
        cell.set(Value::Bool(true)).unwrap();
        assert_eq!(container.child_count(), 1);
        cell.set(falsy).unwrap();
        assert_eq!(container.child_count(), 0);
    }
}

#[test]
fn dropping_the_document_releases_the_binding() {
    let cell = Observable::new(Value::Bool(true));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    let span = Node::element("span");
    container.append_child(&span);

    provider.bind(&container, "if", cell_expr(&cell));
    provider.bind(&span, "text", Rc::new(|_| Ok(Value::from("x"))));
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();
    assert_eq!(container.text_content(), "x");

    let weak_container = container.downgrade();
    let weak_capture = span.downgrade();
    let weak_rendered = container.child(0).unwrap().downgrade();

    drop(span);
    drop(container);

    // The node owns its bindings through the disposal list; nothing the
    // bindings captured may point back strongly, so dropping the document
    // frees the controller, its capture, and the rendered content.
    assert!(weak_container.upgrade().is_none());
    assert!(weak_capture.upgrade().is_none());
    assert!(weak_rendered.upgrade().is_none());
}

#[test]
fn ifnot_inverts_the_condition() {
    let condition = Observable::new(Value::Bool(false));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    container.append_child(&Node::text("shown while false"));

    provider.bind(&container, "ifnot", cell_expr(&condition));
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();
    assert_eq!(container.text_content(), "shown while false");

    condition.set(Value::Bool(true)).unwrap();
    assert_eq!(container.child_count(), 0);
}

#[test]
fn unknown_binding_name_is_an_error() {
    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    provider.bind(&container, "nonexistentHandler", Rc::new(|_| Ok(Value::Bool(true))));
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    let result = apply_bindings(&container, &ctx);
    assert_eq!(
        result,
        Err(BindError::UnknownBinding("nonexistentHandler".to_string()))
    );
}

#[test]
fn expression_errors_surface_from_the_triggering_write() {
    let cell = Observable::new(Value::Bool(false));

    let provider = Rc::new(MapBindingProvider::new());
    let container = Node::element("div");
    container.append_child(&Node::element("span"));

    let cell_for_expr = cell.clone();
    provider.bind(
        &container,
        "if",
        Rc::new(move |_: &BindingContext| {
            let value = cell_for_expr.get();
            if value == Value::from("boom") {
                Err(BindError::Expression("boom".to_string()))
            } else {
                Ok(value)
            }
        }),
    );
    set_provider(provider);

    let ctx = BindingContext::new(Value::object([]));
    apply_bindings(&container, &ctx).unwrap();

    let result = cell.set(Value::from("boom"));
    assert_eq!(result, Err(BindError::Expression("boom".to_string())));
}
