//! Calculator Bridge Example
//!
//! Exports a calculator object on a bridge and drives it with a few
//! hand-written JSON-RPC requests, printing each response. Shows method
//! registration, overload selection and error shaping.

use arbor_bridge::{Arg, Bridge, ExportedClass, InvocationContext, InvokeError, MethodSpec};
use arbor_serializer::{HostValue, TypeDesc};

fn number(arg: &Arg) -> Result<f64, InvokeError> {
    arg.value()
        .and_then(HostValue::as_f64)
        .ok_or_else(|| InvokeError::new("argument must be a number"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bridge = Bridge::new();
    let calculator = ExportedClass::builder("com.example.Calculator")
        .instance_method(MethodSpec::new(
            "add",
            [TypeDesc::F64, TypeDesc::F64],
            |_ctx, _instance, args| {
                Ok(HostValue::F64(number(&args[0])? + number(&args[1])?))
            },
        ))
        .instance_method(MethodSpec::new(
            "subtract",
            [TypeDesc::F64, TypeDesc::F64],
            |_ctx, _instance, args| {
                Ok(HostValue::F64(number(&args[0])? - number(&args[1])?))
            },
        ))
        .instance_method(MethodSpec::new(
            "divide",
            [TypeDesc::F64, TypeDesc::F64],
            |_ctx, _instance, args| {
                let divisor = number(&args[1])?;
                if divisor == 0.0 {
                    return Err(InvokeError::new("division by zero"));
                }
                Ok(HostValue::F64(number(&args[0])? / divisor))
            },
        ))
        .build();
    bridge.register_object("calculator", HostValue::Null, calculator);

    let context = InvocationContext::empty();
    let requests = [
        r#"{"method":"calculator.add","id":1,"params":[2,3]}"#,
        r#"{"method":"calculator.subtract","id":2,"params":[10,4]}"#,
        r#"{"method":"calculator.divide","id":3,"params":[1,0]}"#,
        r#"{"method":"calculator.modulo","id":4,"params":[5,2]}"#,
        r#"{"method":"system.listMethods","id":5,"params":[]}"#,
    ];

    for request in requests {
        let response = bridge.call_str(&context, request);
        println!("--> {}", request);
        println!("<-- {}", response.to_json_string(None));
    }
}
