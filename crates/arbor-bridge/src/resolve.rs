//! Overload resolution: trial-unmarshal every candidate's signature
//! against the wire arguments, rank by worst-position mismatch, and break
//! ties with signature specificity.

use std::sync::Arc;

use arbor_json_rpc::PathComponent;
use arbor_serializer::request::Alias;
use arbor_serializer::{JsonSerializer, ObjectMatch, TypeDesc, UnmarshalError};
use serde_json::Value;
use tracing::debug;

use crate::context::InvocationContext;
use crate::exported::{Arg, MethodSpec};
use crate::localarg::ContextArgRegistry;

struct Candidate {
    method: Arc<MethodSpec>,
    score: ObjectMatch,
}

/// Picks the best overload for the given wire arguments, or `None` when
/// every candidate rejects them.
///
/// A single candidate is returned as-is (its arguments may still fail to
/// unmarshal later, which surfaces as an unmarshal error rather than a
/// missing method). With several candidates each one trial-unmarshals the
/// arguments; failures reject the candidate, scores aggregate the worst
/// position.
pub(crate) fn resolve_method(
    ser: &JsonSerializer,
    candidates: &[Arc<MethodSpec>],
    args: &[Value],
    aliases: &[Alias],
) -> Option<Arc<MethodSpec>> {
    match candidates {
        [] => None,
        [only] => Some(only.clone()),
        _ => {
            let mut best: Option<Candidate> = None;
            for method in candidates {
                match try_unmarshal_args(ser, method, args, aliases) {
                    Ok(score) => {
                        debug!(
                            method = method.name(),
                            signature = method.signature(),
                            mismatch = score.mismatch(),
                            "possible match"
                        );
                        best = Some(match best {
                            None => Candidate {
                                method: method.clone(),
                                score,
                            },
                            Some(prior) if score < prior.score => Candidate {
                                method: method.clone(),
                                score,
                            },
                            Some(prior) if score == prior.score => Candidate {
                                method: better_signature(&prior.method, method).clone(),
                                score,
                            },
                            Some(prior) => prior,
                        });
                    }
                    Err(error) => {
                        debug!(
                            method = method.name(),
                            signature = method.signature(),
                            %error,
                            "candidate rejected"
                        );
                    }
                }
            }
            best.map(|candidate| candidate.method)
        }
    }
}

/// Trial-unmarshals every wire argument of one candidate. Context
/// parameters rate an exact match without consulting the wire.
fn try_unmarshal_args(
    ser: &JsonSerializer,
    method: &MethodSpec,
    args: &[Value],
    aliases: &[Alias],
) -> Result<ObjectMatch, UnmarshalError> {
    let mut state = ser.create_state();
    state.install_aliases(aliases.to_vec());

    let mut aggregate = ObjectMatch::OKAY;
    let mut wire_index = 0usize;
    for (position, param) in method.params().iter().enumerate() {
        if param.is_context() {
            continue;
        }
        let arg = args
            .get(wire_index)
            .ok_or_else(|| UnmarshalError::argument(position + 1, UnmarshalError::custom("missing argument")))?;
        let score = ser
            .try_unmarshal_at(
                &mut state,
                param,
                arg,
                &[
                    PathComponent::Field("params".to_string()),
                    PathComponent::Index(wire_index),
                ],
            )
            .map_err(|e| UnmarshalError::argument(position + 1, e))?;
        aggregate = aggregate.max(score);
        wire_index += 1;
    }
    Ok(aggregate)
}

/// Signature tie-break: position by position, the side with the more
/// specific type (lower primitive rank, or assignable-to the other) earns
/// a point; more points wins, the incumbent wins outright ties.
fn better_signature<'a>(
    incumbent: &'a Arc<MethodSpec>,
    challenger: &'a Arc<MethodSpec>,
) -> &'a Arc<MethodSpec> {
    let a = incumbent.params();
    let b = challenger.params();
    let mut a_points = 0u32;
    let mut b_points = 0u32;
    for (pa, pb) in a.iter().zip(b.iter()) {
        if pa == pb {
            continue;
        }
        match (pa.primitive_rank(), pb.primitive_rank()) {
            (Some(ra), Some(rb)) => {
                if ra < rb {
                    a_points += 1;
                } else {
                    b_points += 1;
                }
            }
            _ => {
                if pb.assignable_to(pa) {
                    // challenger's type is the narrower one
                    b_points += 1;
                } else {
                    a_points += 1;
                }
            }
        }
    }
    if b_points > a_points {
        challenger
    } else {
        incumbent
    }
}

/// Builds the real argument vector for an invocation: context parameters
/// resolve from the call context, everything else unmarshals through the
/// shared per-request state.
pub(crate) fn unmarshal_args(
    ser: &JsonSerializer,
    state: &mut arbor_serializer::SerializerState,
    method: &MethodSpec,
    args: &[Value],
    context: &InvocationContext,
    context_args: &ContextArgRegistry,
) -> Result<Vec<Arg>, UnmarshalError> {
    let mut out = Vec::with_capacity(method.params().len());
    let mut wire_index = 0usize;
    for (position, param) in method.params().iter().enumerate() {
        match param {
            TypeDesc::Context(key) => {
                let resolved = context_args.resolve(key, context)?;
                out.push(Arg::Context(resolved));
            }
            _ => {
                let arg = args.get(wire_index).ok_or_else(|| {
                    UnmarshalError::argument(position + 1, UnmarshalError::custom("missing argument"))
                })?;
                let value = ser
                    .unmarshal_at(
                        state,
                        param,
                        arg,
                        &[
                            PathComponent::Field("params".to_string()),
                            PathComponent::Index(wire_index),
                        ],
                    )
                    .map_err(|e| UnmarshalError::argument(position + 1, e))?;
                out.push(Arg::Value(value));
                wire_index += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_serializer::{ClassRegistry, ClassResolver, HostValue};
    use serde_json::json;

    fn facade() -> JsonSerializer {
        let registry = Arc::new(ClassRegistry::new());
        let resolver = Arc::new(ClassResolver::with_defaults(registry.clone()));
        JsonSerializer::with_defaults(registry, resolver)
    }

    fn method(name: &str, params: Vec<TypeDesc>) -> Arc<MethodSpec> {
        MethodSpec::new(name, params, |_, _, _| Ok(HostValue::Null))
    }

    #[test]
    fn single_candidate_short_circuits() {
        let ser = facade();
        let only = method("echo", vec![TypeDesc::String]);
        let resolved = resolve_method(&ser, &[only.clone()], &[json!(1)], &[]).unwrap();
        assert!(Arc::ptr_eq(&resolved, &only));
    }

    #[test]
    fn numeric_argument_selects_number_overload() {
        let ser = facade();
        let number = method("echo", vec![TypeDesc::F64]);
        let boolean = method("echo", vec![TypeDesc::Bool]);
        let candidates = vec![number.clone(), boolean.clone()];

        let resolved = resolve_method(&ser, &candidates, &[json!(4.5)], &[]).unwrap();
        assert!(Arc::ptr_eq(&resolved, &number));

        let resolved = resolve_method(&ser, &candidates, &[json!(true)], &[]).unwrap();
        assert!(Arc::ptr_eq(&resolved, &boolean));
    }

    #[test]
    fn lower_mismatch_on_every_position_wins() {
        let ser = facade();
        let strings = method("take", vec![TypeDesc::String, TypeDesc::String]);
        let booleans = method("take", vec![TypeDesc::Bool, TypeDesc::Bool]);
        let resolved = resolve_method(
            &ser,
            &[booleans, strings.clone()],
            &[json!("a"), json!("b")],
            &[],
        )
        .unwrap();
        assert!(Arc::ptr_eq(&resolved, &strings));
    }

    #[test]
    fn primitive_ranking_breaks_ties() {
        let ser = facade();
        let int_overload = method("add", vec![TypeDesc::I32]);
        let long_overload = method("add", vec![TypeDesc::I64]);
        // both fit "1" exactly; the narrower primitive wins
        let resolved = resolve_method(
            &ser,
            &[long_overload, int_overload.clone()],
            &[json!(1)],
            &[],
        )
        .unwrap();
        assert!(Arc::ptr_eq(&resolved, &int_overload));
    }

    #[test]
    fn rejecting_all_candidates_yields_none() {
        let ser = facade();
        let a = method("take", vec![TypeDesc::I32]);
        let b = method("take", vec![TypeDesc::I64]);
        assert!(resolve_method(&ser, &[a, b], &[json!("not a number")], &[]).is_none());
    }

    #[test]
    fn context_params_do_not_consume_wire_args() {
        let ser = facade();
        let with_context = method(
            "ctx",
            vec![TypeDesc::Context("session".to_string()), TypeDesc::I32],
        );
        let plain = method("ctx", vec![TypeDesc::Bool]);
        let resolved =
            resolve_method(&ser, &[with_context.clone(), plain], &[json!(5)], &[]).unwrap();
        assert!(Arc::ptr_eq(&resolved, &with_context));
    }
}
