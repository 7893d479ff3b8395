//! End-to-end request/response scenarios through a fully assembled bridge.

use std::sync::Arc;

use arbor_bridge::{
    Arg, Bridge, ExportedClass, InvocationContext, InvokeError, MethodSpec,
};
use arbor_serializer::{
    BeanClass, BeanValue, FixupPolicy, HostValue, OutputMode, TypeDesc, UnmarshalError,
};
use serde_json::{json, Value};

#[derive(Default)]
struct BeanA {
    bean_b: Option<BeanValue>,
}

#[derive(Default)]
struct BeanB {
    bean_a: Option<BeanValue>,
}

fn bean_field(value: &Option<BeanValue>) -> HostValue {
    match value {
        Some(bean) => HostValue::Bean(bean.clone()),
        None => HostValue::Null,
    }
}

fn bean_a_class() -> Arc<BeanClass> {
    BeanClass::builder::<BeanA>("com.example.BeanA")
        .constructor(BeanA::default)
        .safe_for_dispatch(true)
        .property(
            "beanB",
            TypeDesc::Bean("com.example.BeanB".to_string()),
            |a| bean_field(&a.bean_b),
            |a, v| {
                a.bean_b = v.as_bean().cloned();
                Ok(())
            },
        )
        .build()
}

fn bean_b_class() -> Arc<BeanClass> {
    BeanClass::builder::<BeanB>("com.example.BeanB")
        .constructor(BeanB::default)
        .safe_for_dispatch(true)
        .property(
            "beanA",
            TypeDesc::Bean("com.example.BeanA".to_string()),
            |b| bean_field(&b.bean_a),
            |b, v| {
                b.bean_a = v.as_bean().cloned();
                Ok(())
            },
        )
        .build()
}

fn first_value(mut args: Vec<Arg>) -> HostValue {
    match args.drain(..).next() {
        Some(Arg::Value(value)) => value,
        _ => HostValue::Null,
    }
}

fn test_class(bean_a: Arc<BeanClass>, bean_b: Arc<BeanClass>) -> Arc<ExportedClass> {
    ExportedClass::builder("com.example.Test")
        .instance_method(MethodSpec::new("echo", [TypeDesc::String], |_, _, args| {
            Ok(first_value(args))
        }))
        .instance_method(MethodSpec::new(
            "echo",
            [TypeDesc::Array(Box::new(TypeDesc::I32))],
            |_, _, args| Ok(first_value(args)),
        ))
        .instance_method(MethodSpec::new("echo", [TypeDesc::F64], |_, _, args| {
            Ok(first_value(args))
        }))
        .instance_method(MethodSpec::new("echo", [TypeDesc::Bool], |_, _, args| {
            Ok(first_value(args))
        }))
        .instance_method(MethodSpec::new("aBean", [], move |_, _, _| {
            let a = BeanValue::new(bean_a.clone(), BeanA::default());
            let b = BeanValue::new(
                bean_b.clone(),
                BeanB {
                    bean_a: Some(a.clone()),
                },
            );
            a.with_mut(|inner: &mut BeanA| inner.bean_b = Some(b.clone()))
                .ok_or_else(|| InvokeError::new("bean instance type mismatch"))?;
            Ok(HostValue::Bean(a))
        }))
        .instance_method(MethodSpec::new("takeAny", [TypeDesc::Any], |_, _, args| {
            Ok(first_value(args))
        }))
        .instance_method(MethodSpec::new(
            "sameIdentity",
            [TypeDesc::Any, TypeDesc::Any],
            |_, _, args| {
                let same = match (&args[0], &args[1]) {
                    (Arg::Value(a), Arg::Value(b)) => a.same_identity(b),
                    _ => false,
                };
                Ok(HostValue::Bool(same))
            },
        ))
        .instance_method(MethodSpec::new("explode", [], |_, _, _| {
            Err(InvokeError::new("the kaboom was expected"))
        }))
        .build()
}

fn build_bridge() -> Bridge {
    let bridge = Bridge::new();
    install_test_object(&bridge);
    bridge
}

fn install_test_object(bridge: &Bridge) {
    let bean_a = bean_a_class();
    let bean_b = bean_b_class();
    bridge.register_bean_class(bean_a.clone());
    bridge.register_bean_class(bean_b.clone());
    bridge.register_object("test", HostValue::Null, test_class(bean_a, bean_b));
}

fn call(bridge: &Bridge, request: Value) -> Value {
    bridge
        .call_value(&InvocationContext::empty(), &request)
        .to_value(None)
}

#[test]
fn echo_string() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({"method": "test.echo", "id": 1, "params": ["hello"]}),
    );
    assert_eq!(response, json!({"id": 1, "result": "hello"}));
}

#[test]
fn echo_int_array() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({"method": "test.echo", "id": 2, "params": [[1, 2, 3]]}),
    );
    assert_eq!(response, json!({"id": 2, "result": [1, 2, 3]}));
}

#[test]
fn bean_cycle_response_carries_one_fixup() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({"method": "test.aBean", "id": 3, "params": []}),
    );
    assert_eq!(response["id"], json!(3));
    assert_eq!(response["result"]["javaClass"], json!("com.example.BeanA"));
    assert_eq!(
        response["result"]["beanB"]["javaClass"],
        json!("com.example.BeanB")
    );
    assert_eq!(response["result"]["beanB"]["beanA"], Value::Null);
    assert_eq!(
        response["fixups"],
        json!([[["result", "beanB", "beanA"], ["result"]]])
    );
}

#[test]
fn missing_method_is_591() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({"method": "test.missing", "id": 4, "params": []}),
    );
    assert_eq!(response["id"], json!(4));
    assert_eq!(response["error"]["code"], json!(591));
}

#[test]
fn disallowed_class_hint_is_592() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({
            "method": "test.takeAny",
            "id": 5,
            "params": [{"javaClass": "com.evil.Seed", "map": {}}]
        }),
    );
    assert_eq!(response["error"]["code"], json!(592));

    let response = call(
        &bridge,
        json!({
            "method": "test.takeAny",
            "id": 6,
            "params": [{"javaClass": "sun.misc.Unsafe", "map": {}}]
        }),
    );
    assert_eq!(response["error"]["code"], json!(592));
}

#[test]
fn overload_selection_by_argument_kind() {
    let bridge = build_bridge();

    let response = call(
        &bridge,
        json!({"method": "test.echo", "id": 7, "params": [12.5]}),
    );
    assert_eq!(response, json!({"id": 7, "result": 12.5}));

    let response = call(
        &bridge,
        json!({"method": "test.echo", "id": 8, "params": [true]}),
    );
    assert_eq!(response, json!({"id": 8, "result": true}));
}

#[test]
fn remote_error_is_490_with_message() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({"method": "test.explode", "id": 9, "params": []}),
    );
    assert_eq!(response["error"]["code"], json!(490));
    assert_eq!(response["error"]["message"], json!("the kaboom was expected"));
    // no stack detail crosses the wire
    assert!(response["error"].get("data").is_none());
}

#[test]
fn request_fixups_restore_shared_arguments() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({
            "method": "test.sameIdentity",
            "id": 10,
            "params": [
                {"javaClass": "java.util.ArrayList", "list": [1]},
                null
            ],
            "fixups": [[["params", 1], ["params", 0]]]
        }),
    );
    assert_eq!(response, json!({"id": 10, "result": true}));
}

#[test]
fn malformed_fixups_are_594() {
    let bridge = build_bridge();
    let response = call(
        &bridge,
        json!({
            "method": "test.sameIdentity",
            "id": 11,
            "params": [null, null],
            "fixups": [[["params", 1]]]
        }),
    );
    assert_eq!(response["error"]["code"], json!(594));
}

#[test]
fn parse_error_is_590_with_null_id() {
    let bridge = build_bridge();
    let response = bridge
        .call_str(&InvocationContext::empty(), "{not json")
        .to_value(None);
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], json!(590));
}

#[test]
fn constructor_dispatch() {
    let bridge = build_bridge();
    let factory = ExportedClass::builder("Factory")
        .constructor([TypeDesc::I32], |_, _, args| {
            let n = match &args[0] {
                Arg::Value(value) => value.as_i32().unwrap_or(0),
                _ => 0,
            };
            Ok(HostValue::from(n * 2))
        })
        .build();
    bridge.register_class(factory);

    let response = call(
        &bridge,
        json!({"method": "Factory.$constructor", "id": 12, "params": [21]}),
    );
    assert_eq!(response, json!({"id": 12, "result": 42}));

    let response = call(
        &bridge,
        json!({"method": "Factory.$constructor", "id": 13, "params": [1, 2]}),
    );
    assert_eq!(response["error"]["code"], json!(594));
}

#[test]
fn callable_reference_roundtrip() {
    use std::sync::atomic::{AtomicI64, Ordering};

    struct Counter {
        count: AtomicI64,
    }

    let bridge = build_bridge();
    let counter_class = ExportedClass::builder("com.example.Counter")
        .instance_method(MethodSpec::new("increment", [], |_, instance, _| {
            let opaque = match instance {
                Some(HostValue::Opaque(opaque)) => opaque,
                _ => return Err(InvokeError::new("not a counter instance")),
            };
            let counter = opaque
                .downcast::<Counter>()
                .ok_or_else(|| InvokeError::new("not a counter instance"))?;
            Ok(HostValue::I64(counter.count.fetch_add(1, Ordering::SeqCst) + 1))
        }))
        .build();
    bridge.register_callable_reference(counter_class);

    // a method that hands out a counter instance
    let maker = ExportedClass::builder("com.example.Makers")
        .instance_method(MethodSpec::new("makeCounter", [], |_, _, _| {
            Ok(HostValue::Opaque(arbor_serializer::OpaqueValue::new(
                "com.example.Counter",
                Counter {
                    count: AtomicI64::new(0),
                },
            )))
        }))
        .build();
    bridge.register_object("makers", HostValue::Null, maker);

    let response = call(
        &bridge,
        json!({"method": "makers.makeCounter", "id": 14, "params": []}),
    );
    assert_eq!(
        response["result"]["JSONRPCType"],
        json!("CallableReference")
    );
    assert_eq!(response["result"]["javaClass"], json!("com.example.Counter"));
    let object_id = response["result"]["objectID"].as_u64().unwrap();

    let request = json!({
        "method": format!(".obj[{}].increment", object_id),
        "id": 15,
        "params": []
    });
    assert_eq!(call(&bridge, request.clone()), json!({"id": 15, "result": 1}));
    let second = json!({
        "method": format!(".obj[{}].increment", object_id),
        "id": 16,
        "params": []
    });
    assert_eq!(call(&bridge, second), json!({"id": 16, "result": 2}));

    // explicit invalidation kills the handle
    assert!(bridge.invalidate_reference(object_id));
    let gone = call(&bridge, request);
    assert_eq!(gone["error"]["code"], json!(591));
}

#[test]
fn system_list_methods_catalogue() {
    let bridge = build_bridge();
    let factory = ExportedClass::builder("Factory")
        .static_method(MethodSpec::new("make", [TypeDesc::I32], |_, _, args| {
            Ok(first_value(args))
        }))
        .build();
    bridge.register_class(factory);

    let response = call(
        &bridge,
        json!({"method": "system.listMethods", "id": 17, "params": []}),
    );
    let names: Vec<&str> = response["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();

    assert!(names.contains(&"test.echo"));
    assert!(names.contains(&"test.aBean"));
    assert!(names.contains(&"Factory.make"));
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn flat_mode_output_and_input() {
    let bridge = Bridge::builder().output_mode(OutputMode::Flat).build();
    install_test_object(&bridge);

    let response = call(
        &bridge,
        json!({"method": "test.aBean", "id": 18, "params": []}),
    );
    assert_eq!(response["result"], json!("_1"));
    assert_eq!(response["_1"]["javaClass"], json!("com.example.BeanA"));
    assert_eq!(response["_1"]["beanB"], json!("_2"));
    assert_eq!(response["_2"]["javaClass"], json!("com.example.BeanB"));
    assert_eq!(response["_2"]["beanA"], json!("_1"));

    // flat-form request: both params are the same hoisted object
    let response = call(
        &bridge,
        json!({
            "method": "test.sameIdentity",
            "id": 19,
            "params": ["_1", "_1"],
            "_1": {"javaClass": "java.util.ArrayList", "list": [1]}
        }),
    );
    assert_eq!(response["result"], json!(true));
}

#[test]
fn cycles_are_fatal_without_the_policy() {
    let bridge = Bridge::builder()
        .output_mode(OutputMode::Fixups(FixupPolicy::None))
        .build();
    install_test_object(&bridge);

    let response = call(
        &bridge,
        json!({"method": "test.aBean", "id": 20, "params": []}),
    );
    assert_eq!(response["error"]["code"], json!(593));
}

#[test]
fn context_arguments_inject_without_consuming_wire_args() {
    use arbor_bridge::ContextArgResolver;
    use std::any::Any;

    struct Session {
        user: String,
    }

    struct UserResolver;

    impl ContextArgResolver for UserResolver {
        fn resolve(
            &self,
            item: &Arc<dyn Any + Send + Sync>,
        ) -> Result<Arc<dyn Any + Send + Sync>, UnmarshalError> {
            let session = item
                .clone()
                .downcast::<Session>()
                .map_err(|_| UnmarshalError::ContextArg("not a session".to_string()))?;
            Ok(Arc::new(session.user.clone()))
        }
    }

    let bridge = build_bridge();
    bridge.register_context_arg::<Session>("session.user", Arc::new(UserResolver));

    let greeter = ExportedClass::builder("com.example.Greeter")
        .instance_method(MethodSpec::new(
            "greet",
            [
                TypeDesc::Context("session.user".to_string()),
                TypeDesc::String,
            ],
            |_, _, args| {
                let user = args[0]
                    .context::<String>()
                    .ok_or_else(|| InvokeError::new("no session user"))?;
                let greeting = args[1].value().and_then(HostValue::as_str).unwrap_or("");
                Ok(HostValue::from(format!("{} {}", greeting, user)))
            },
        ))
        .build();
    bridge.register_object("greeter", HostValue::Null, greeter);

    let context = InvocationContext::empty().with(Session {
        user: "ada".to_string(),
    });
    let response = bridge
        .call_value(
            &context,
            &json!({"method": "greeter.greet", "id": 21, "params": ["hi"]}),
        )
        .to_value(None);
    assert_eq!(response, json!({"id": 21, "result": "hi ada"}));
}
