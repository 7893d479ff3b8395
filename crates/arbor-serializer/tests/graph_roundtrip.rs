//! Whole-graph properties: shared and cyclic structures survive a
//! marshal/unmarshal roundtrip with their identity-sharing intact, and
//! marshalling is deterministic.

use std::sync::Arc;

use arbor_json_rpc::{PathComponent, RequestId};
use arbor_serializer::{
    BeanClass, BeanValue, ClassRegistry, ClassResolver, HostValue, JsonSerializer,
    NestedRequestParser, RequestParser, TypeDesc, UnmarshalError,
};
use serde_json::json;

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

fn registry() -> Arc<ClassRegistry> {
    let registry = Arc::new(ClassRegistry::new());
    registry.register_bean(
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
            .build(),
    );
    registry.register_bean(
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
            .build(),
    );
    registry
}

fn facade() -> JsonSerializer {
    let registry = registry();
    let resolver = Arc::new(ClassResolver::with_defaults(registry.clone()));
    JsonSerializer::with_defaults(registry, resolver)
}

fn result_root() -> PathComponent {
    PathComponent::Field("result".to_string())
}

fn make_cycle(ser: &JsonSerializer) -> HostValue {
    let class_a = ser.registry().bean("com.example.BeanA").unwrap();
    let class_b = ser.registry().bean("com.example.BeanB").unwrap();
    let a = BeanValue::new(class_a, BeanA::default());
    let b = BeanValue::new(class_b, BeanB { bean_a: Some(a.clone()) });
    a.with_mut(|inner: &mut BeanA| inner.bean_b = Some(b.clone()))
        .expect("bean instance is a BeanA");
    HostValue::Bean(a)
}

#[test]
fn bean_cycle_marshals_with_one_fixup() {
    let ser = facade();
    let mut state = ser.create_state();
    let graph = make_cycle(&ser);

    let json = ser.marshal_value(&mut state, &graph, result_root()).unwrap();
    assert_eq!(json["javaClass"], json!("com.example.BeanA"));
    assert_eq!(json["beanB"]["javaClass"], json!("com.example.BeanB"));
    assert_eq!(json["beanB"]["beanA"], serde_json::Value::Null);

    let result = state.into_result(Some(RequestId::Number(3)), json);
    let output = result.to_value(None);
    assert_eq!(
        output["fixups"],
        json!([[["result", "beanB", "beanA"], ["result"]]])
    );
}

#[test]
fn bean_cycle_roundtrips_with_identity() {
    let ser = facade();
    let mut state = ser.create_state();
    let graph = make_cycle(&ser);
    let json = ser.marshal_value(&mut state, &graph, result_root()).unwrap();
    let response = state
        .into_result(Some(RequestId::Number(3)), json)
        .to_value(None);

    // client side: parse the response, then unmarshal the result subtree
    let message = response.as_object().unwrap();
    let (result_tree, aliases) = NestedRequestParser.parse_value(message, "result").unwrap();

    let mut state = ser.create_state();
    state.install_aliases(aliases);
    let restored = ser
        .unmarshal_at(
            &mut state,
            &TypeDesc::Bean("com.example.BeanA".to_string()),
            &result_tree,
            &[result_root()],
        )
        .unwrap();

    let a = restored.as_bean().unwrap();
    let b = a.with(|inner: &BeanA| inner.bean_b.clone().unwrap()).unwrap();
    let a_again = b.with(|inner: &BeanB| inner.bean_a.clone().unwrap()).unwrap();
    assert_eq!(a.identity(), a_again.identity());
}

#[test]
fn duplicate_arguments_share_identity_after_unmarshal() {
    let ser = facade();
    let request = json!({
        "method": "test.take",
        "id": 9,
        "params": [
            {"javaClass": "java.util.ArrayList", "list": [1, 2]},
            null
        ],
        "fixups": [[["params", 1], ["params", 0]]]
    });
    let message = request.as_object().unwrap();
    let parsed = NestedRequestParser.parse_arguments(message, "params").unwrap();

    let mut state = ser.create_state();
    state.install_aliases(parsed.aliases);
    let params_root = PathComponent::Field("params".to_string());

    let first = ser
        .unmarshal_at(
            &mut state,
            &TypeDesc::Any,
            &parsed.args[0],
            &[params_root.clone(), PathComponent::Index(0)],
        )
        .unwrap();
    let second = ser
        .unmarshal_at(
            &mut state,
            &TypeDesc::Any,
            &parsed.args[1],
            &[params_root, PathComponent::Index(1)],
        )
        .unwrap();

    assert!(first.same_identity(&second));
}

#[test]
fn marshalling_is_deterministic() {
    let ser = facade();
    let graph = HostValue::map(vec![
        ("b".to_string(), HostValue::from(2)),
        ("a".to_string(), HostValue::list(vec![HostValue::from(1)])),
    ]);

    let mut state = ser.create_state();
    let first = ser.marshal_value(&mut state, &graph, result_root()).unwrap();
    let mut state = ser.create_state();
    let second = ser.marshal_value(&mut state, &graph, result_root()).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn disallowed_hint_cannot_instantiate() {
    let ser = facade();
    let mut state = ser.create_state();
    let hostile = json!({"javaClass": "com.example.Secret", "map": {}});
    let err = ser
        .unmarshal_at(&mut state, &TypeDesc::Any, &hostile, &[result_root()])
        .unwrap_err();
    assert!(matches!(err, UnmarshalError::ClassNotResolved(_)));

    let mut state = ser.create_state();
    let prefixed = json!({"javaClass": "sun.misc.Unsafe", "map": {}});
    assert!(ser
        .unmarshal_at(&mut state, &TypeDesc::Any, &prefixed, &[result_root()])
        .is_err());
}
