// Predicate expression evaluator
//
// Rules are authored outside the worker as JSON expression trees and must
// be sandboxed: anything malformed, mistyped, or of the wrong arity
// evaluates to false instead of failing the event.

use serde_json::{Map, Value};

/// The three stat scopes a predicate can reference via dotted paths
/// ("per_game.points", "season.pts_total", "career.has_50pt_game").
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub per_game: Map<String, Value>,
    pub season: Map<String, Value>,
    pub career: Map<String, Value>,
}

impl EvalContext {
    pub fn new(
        per_game: Map<String, Value>,
        season: Map<String, Value>,
        career: Map<String, Value>,
    ) -> Self {
        Self {
            per_game,
            season,
            career,
        }
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let scope = match segments.next()? {
            "per_game" => &self.per_game,
            "season" => &self.season,
            "career" => &self.career,
            _ => return None,
        };
        let mut current = scope.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Has,
}

impl OpKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            ">=" => Some(OpKind::Ge),
            ">" => Some(OpKind::Gt),
            "<=" => Some(OpKind::Le),
            "<" => Some(OpKind::Lt),
            "==" => Some(OpKind::Eq),
            "!=" => Some(OpKind::Ne),
            "and" => Some(OpKind::And),
            "or" => Some(OpKind::Or),
            "not" => Some(OpKind::Not),
            "+" => Some(OpKind::Add),
            "-" => Some(OpKind::Sub),
            "*" => Some(OpKind::Mul),
            "/" => Some(OpKind::Div),
            "has" => Some(OpKind::Has),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Literal(Value),
    Path(String),
    Op(OpKind, Vec<Node>),
    Malformed,
}

impl Node {
    fn parse(value: &Value) -> Node {
        match value {
            Value::Bool(_) | Value::Number(_) => Node::Literal(value.clone()),
            Value::String(text) => {
                if text.contains('.') {
                    Node::Path(text.clone())
                } else {
                    Node::Literal(value.clone())
                }
            }
            Value::Object(map) => {
                if map.len() != 1 {
                    return Node::Malformed;
                }
                let Some((name, args)) = map.iter().next() else {
                    return Node::Malformed;
                };
                let Some(kind) = OpKind::parse(name) else {
                    return Node::Malformed;
                };
                let children = match args {
                    Value::Array(items) => items.iter().map(Node::parse).collect(),
                    single => vec![Node::parse(single)],
                };
                Node::Op(kind, children)
            }
            _ => Node::Malformed,
        }
    }
}

/// Evaluates a predicate tree against the context. Pure and total: every
/// failure mode (unknown operator, wrong arity, missing path, non-numeric
/// comparison) resolves to false.
pub fn evaluate(predicate: &Value, ctx: &EvalContext) -> bool {
    eval_bool(&Node::parse(predicate), ctx)
}

fn eval_bool(node: &Node, ctx: &EvalContext) -> bool {
    match node {
        Node::Literal(_) | Node::Path(_) => truthy(&eval_value(node, ctx)),
        Node::Malformed => false,
        Node::Op(kind, args) => match kind {
            OpKind::Ge | OpKind::Gt | OpKind::Le | OpKind::Lt => {
                let [Some(lhs), Some(rhs)] = binary_numbers(args, ctx) else {
                    return false;
                };
                match kind {
                    OpKind::Ge => lhs >= rhs,
                    OpKind::Gt => lhs > rhs,
                    OpKind::Le => lhs <= rhs,
                    _ => lhs < rhs,
                }
            }
            OpKind::Eq | OpKind::Ne => {
                if args.len() != 2 {
                    return false;
                }
                let equal = eval_value(&args[0], ctx) == eval_value(&args[1], ctx);
                if *kind == OpKind::Eq {
                    equal
                } else {
                    !equal
                }
            }
            OpKind::And => args.iter().all(|child| eval_bool(child, ctx)),
            OpKind::Or => args.iter().any(|child| eval_bool(child, ctx)),
            OpKind::Not => {
                if args.len() != 1 {
                    return false;
                }
                !eval_bool(&args[0], ctx)
            }
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => {
                match arithmetic(*kind, args, ctx) {
                    Some(result) => result != 0.0,
                    None => false,
                }
            }
            OpKind::Has => {
                if args.len() != 2 {
                    return false;
                }
                let target = eval_value(&args[0], ctx);
                let key = eval_value(&args[1], ctx);
                match (target, key) {
                    (Some(Value::Object(map)), Some(Value::String(key))) => map.contains_key(&key),
                    _ => false,
                }
            }
        },
    }
}

/// None is "undefined": a missing path or a node that cannot produce a
/// value in this position.
fn eval_value(node: &Node, ctx: &EvalContext) -> Option<Value> {
    match node {
        Node::Literal(value) => Some(value.clone()),
        Node::Path(path) => ctx.lookup(path).cloned(),
        Node::Malformed => None,
        Node::Op(kind, args) => match kind {
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => {
                arithmetic(*kind, args, ctx).and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            }
            _ => Some(Value::Bool(eval_bool(node, ctx))),
        },
    }
}

fn arithmetic(kind: OpKind, args: &[Node], ctx: &EvalContext) -> Option<f64> {
    let [Some(lhs), Some(rhs)] = binary_numbers(args, ctx) else {
        return None;
    };
    let result = match kind {
        OpKind::Add => lhs + rhs,
        OpKind::Sub => lhs - rhs,
        OpKind::Mul => lhs * rhs,
        OpKind::Div => {
            if rhs == 0.0 {
                0.0
            } else {
                lhs / rhs
            }
        }
        _ => return None,
    };
    result.is_finite().then_some(result)
}

fn binary_numbers(args: &[Node], ctx: &EvalContext) -> [Option<f64>; 2] {
    if args.len() != 2 {
        return [None, None];
    }
    [as_number(&args[0], ctx), as_number(&args[1], ctx)]
}

fn as_number(node: &Node, ctx: &EvalContext) -> Option<f64> {
    match eval_value(node, ctx)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EvalContext {
        let per_game = json!({"points": 52.0, "ast": 4.0, "reb": 6.0, "fga": 0.0, "fgm": 18.0});
        let season = json!({"pts_total": 812.0, "games_played": 20, "has_triple_double": true});
        let career = json!({"pts_total": 14000.0, "max_pts_game": 61.0});
        EvalContext::new(
            per_game.as_object().unwrap().clone(),
            season.as_object().unwrap().clone(),
            career.as_object().unwrap().clone(),
        )
    }

    #[test]
    fn comparisons_resolve_paths() {
        assert!(evaluate(&json!({">=": ["per_game.points", 50]}), &ctx()));
        assert!(!evaluate(&json!({"<": ["per_game.points", 50]}), &ctx()));
        assert!(evaluate(&json!({">": ["career.pts_total", "season.pts_total"]}), &ctx()));
    }

    #[test]
    fn missing_path_compares_false() {
        // the "pointz" typo scenario: no award, no failure
        assert!(!evaluate(&json!({">=": ["per_game.pointz", 50]}), &ctx()));
    }

    #[test]
    fn non_numeric_comparison_is_false() {
        assert!(!evaluate(&json!({">=": ["season.has_triple_double", 1]}), &ctx()));
        assert!(!evaluate(&json!({">=": [true, 0]}), &ctx()));
    }

    #[test]
    fn equality_is_structural() {
        assert!(evaluate(&json!({"==": ["season.games_played", 20]}), &ctx()));
        assert!(evaluate(&json!({"==": ["season.has_triple_double", true]}), &ctx()));
        assert!(evaluate(&json!({"!=": ["per_game.points", 50]}), &ctx()));
    }

    #[test]
    fn and_or_short_circuit_with_identity_arities() {
        assert!(evaluate(&json!({"and": []}), &ctx()));
        assert!(!evaluate(&json!({"or": []}), &ctx()));
        assert!(evaluate(
            &json!({"and": [{">=": ["per_game.points", 50]}, {">": ["per_game.ast", 3]}]}),
            &ctx()
        ));
        assert!(evaluate(
            &json!({"or": [{">=": ["per_game.pointz", 50]}, true]}),
            &ctx()
        ));
    }

    #[test]
    fn not_takes_exactly_one_argument() {
        assert!(evaluate(&json!({"not": {"<": ["per_game.points", 50]}}), &ctx()));
        assert!(!evaluate(&json!({"not": [true, false]}), &ctx()));
    }

    #[test]
    fn arithmetic_nests_inside_comparisons() {
        // shooting percentage with a zero-attempt guard: 0/0 yields 0
        assert!(!evaluate(
            &json!({">=": [{"/": ["per_game.fgm", "per_game.fga"]}, 0.5]}),
            &ctx()
        ));
        assert!(evaluate(
            &json!({">=": [{"+": ["per_game.points", "per_game.ast"]}, 56]}),
            &ctx()
        ));
    }

    #[test]
    fn arithmetic_in_boolean_position_tests_non_zero() {
        assert!(evaluate(&json!({"-": ["per_game.points", 50]}), &ctx()));
        assert!(!evaluate(&json!({"-": ["per_game.points", 52]}), &ctx()));
    }

    #[test]
    fn has_checks_key_presence_on_objects() {
        let mut context = ctx();
        context.per_game.insert("meta".to_string(), json!({"overtime": true}));
        assert!(evaluate(&json!({"has": ["per_game.meta", "overtime"]}), &context));
        assert!(!evaluate(&json!({"has": ["per_game.meta", "double_ot"]}), &context));
        assert!(!evaluate(&json!({"has": ["per_game.points", "overtime"]}), &context));
    }

    #[test]
    fn malformed_nodes_evaluate_false() {
        assert!(!evaluate(&json!({"pow": [2, 3]}), &ctx()));
        assert!(!evaluate(&json!({">=": ["per_game.points"]}), &ctx()));
        assert!(!evaluate(&json!(null), &ctx()));
        assert!(!evaluate(&json!([1, 2]), &ctx()));
        assert!(!evaluate(&json!({">=": ["per_game.points", 50], "extra": 1}), &ctx()));
    }

    #[test]
    fn dotted_strings_are_paths_and_plain_strings_literals() {
        assert!(evaluate(&json!({"==": ["gold", "gold"]}), &ctx()));
        assert!(!evaluate(&json!({"==": ["per_game.points", "per_game.ast"]}), &ctx()));
    }

    #[test]
    fn deep_paths_traverse_nested_objects() {
        let mut context = ctx();
        context
            .per_game
            .insert("splits".to_string(), json!({"q4": {"points": 20}}));
        assert!(evaluate(&json!({">=": ["per_game.splits.q4.points", 15]}), &context));
    }
}
