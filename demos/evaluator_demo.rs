// Demonstration of the opcode evaluator
//
// Each example shows the jq filter it corresponds to, the program as the
// external parser would hand it over, and what evaluating it produces:
// - Field access and indexing
// - Optional (non-strict) access
// - Exploding arrays and objects
// - Array and object construction under fan-out
// - Pipes

use jqlite::{execute_json, Evaluator, Opcode, Program, Value};
use serde_json::json;

fn main() {
    println!("=== Opcode Evaluator Demo ===\n");

    demo_access();
    demo_optional();
    demo_construction();
    demo_pipes();
    demo_errors();
}

fn show(filter: &str, program: &Program, input: &Value) {
    match Evaluator::new().run(program, input.clone()) {
        Ok(results) if results.is_empty() => println!("  {} => (no results)", filter),
        Ok(results) => {
            let rendered: Vec<String> = results.iter().map(Value::to_string).collect();
            println!("  {} => {}", filter, rendered.join(", "));
        }
        Err(e) => println!("  {} => ERROR: {}", filter, e),
    }
}

fn demo_access() {
    println!("--- Field Access ---");

    let input = Value::from(json!({
        "user": {"name": "Alice", "langs": ["rust", "jq", "sql"]}
    }));

    show(".user.name", &Program::new(vec![Opcode::pick("user"), Opcode::pick("name")]), &input);
    show(
        ".user.langs[-1]",
        &Program::new(vec![Opcode::pick("user"), Opcode::pick("langs"), Opcode::index(-1)]),
        &input,
    );
    show(
        ".user.langs[1:]",
        &Program::new(vec![
            Opcode::pick("user"),
            Opcode::pick("langs"),
            Opcode::slice(Some(1), None),
        ]),
        &input,
    );
    show(".user[]", &Program::new(vec![Opcode::pick("user"), Opcode::explode()]), &input);
    println!();
}

fn demo_optional() {
    println!("--- Optional Access ---");

    let input = Value::from(json!([{"a": 1}, "text", {"a": 2}, 7]));
    show(".[] | .a?", &Program::from(Opcode::pipe(Opcode::explode(), Opcode::try_pick("a"))), &input);
    show(".[] | .a", &Program::from(Opcode::pipe(Opcode::explode(), Opcode::pick("a"))), &input);
    println!();
}

fn demo_construction() {
    println!("--- Construction ---");

    let input = Value::from(json!({"user": "stedolan", "titles": ["JQ Primer", "More JQ"]}));

    show(
        "[.titles[]]",
        &Program::from(Opcode::create_array(vec![Program::new(vec![
            Opcode::pick("titles"),
            Opcode::explode(),
        ])])),
        &input,
    );
    show(
        "{user: .user, title: .titles[]}",
        &Program::from(Opcode::create_object(vec![
            ("user", Program::from(Opcode::pick("user"))),
            ("title", Program::new(vec![Opcode::pick("titles"), Opcode::explode()])),
        ])),
        &input,
    );
    println!();
}

fn demo_pipes() {
    println!("--- Pipes (parser JSON form) ---");

    let program = json!([{
        "op": "pipe",
        "in": [{"op": "pick", "key": "orders", "explode": true}],
        "out": [{"op": "create_object", "entries": [
            {"key": "id", "value": [{"op": "pick", "key": "id"}]},
            {"key": "sku", "value": [{"op": "pick", "key": "items", "explode": true}]}
        ]}]
    }]);
    let input = json!({"orders": [
        {"id": 1, "items": ["a", "b"]},
        {"id": 2, "items": []},
        {"id": 3, "items": ["c"]}
    ]});

    println!("  .orders[] | {{id: .id, sku: .items[]}}");
    match execute_json(&input.to_string(), &program.to_string()) {
        Ok(lines) => lines.iter().for_each(|line| println!("    {}", line)),
        Err(e) => println!("    ERROR: {}", e),
    }
    println!();
}

fn demo_errors() {
    println!("--- Errors ---");

    let input = Value::from(json!({"xs": null}));
    show(".xs[]", &Program::new(vec![Opcode::pick("xs"), Opcode::explode()]), &input);
    show(".xs[]?", &Program::new(vec![Opcode::pick("xs"), Opcode::try_explode()]), &input);
    show(".[:]", &Program::from(Opcode::slice(None, None)), &input);

    match execute_json("{}", r#"[{"op":"reduce"}]"#) {
        Ok(_) => println!("  reduce => unexpectedly succeeded"),
        Err(e) => println!("  reduce => ERROR: {}", e),
    }
    println!();
}
