use nodeflow::{
    BoxError, ExecutionMode, Graph, GraphDefinition, Node, NodeContext, NodeRegistry, Port,
};

const GRAPH_DOCUMENT: &str = r#"{
    "name": "arithmetic",
    "nodes": {
        "rng_a": { "type": "RandomNumberGenerator", "settings": { "seed": 7 } },
        "rng_b": { "type": "RandomNumberGenerator", "settings": { "seed": 1234 } },
        "add": { "type": "Adder" },
        "square": { "type": "Squarer" },
        "print": { "type": "NumberPrinter" }
    },
    "connections": [
        ["rng_a:number", "add:a"],
        ["rng_b:number", "add:b"],
        ["add:sum", "square:x"],
        ["square:x2", "print:number"]
    ]
}"#;

/// Produces a pseudo-random number in `0..100` from its `seed` setting.
struct RandomNumberGenerator {
    ctx: NodeContext,
    state: u64,
}

impl Node for RandomNumberGenerator {
    fn context(&self) -> &NodeContext {
        &self.ctx
    }

    fn execute(&mut self) -> Result<(), BoxError> {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let number = ((self.state >> 33) % 100) as f32;
        println!("{} says: {}", self.ctx.name(), number);
        self.ctx.set_output("number", number)?;
        Ok(())
    }
}

struct Adder {
    ctx: NodeContext,
}

impl Node for Adder {
    fn context(&self) -> &NodeContext {
        &self.ctx
    }

    fn execute(&mut self) -> Result<(), BoxError> {
        let a: f32 = self.ctx.get_input("a")?;
        let b: f32 = self.ctx.get_input("b")?;
        let sum = a + b;
        println!("{} + {} = {}", a, b, sum);
        self.ctx.set_output("sum", sum)?;
        Ok(())
    }
}

struct Squarer {
    ctx: NodeContext,
}

impl Node for Squarer {
    fn context(&self) -> &NodeContext {
        &self.ctx
    }

    fn execute(&mut self) -> Result<(), BoxError> {
        let x: f32 = self.ctx.get_input("x")?;
        self.ctx.set_output("x2", x * x)?;
        Ok(())
    }
}

struct NumberPrinter {
    ctx: NodeContext,
}

impl Node for NumberPrinter {
    fn context(&self) -> &NodeContext {
        &self.ctx
    }

    fn execute(&mut self) -> Result<(), BoxError> {
        let number: f32 = self.ctx.get_input("number")?;
        println!("the number is: {}", number);
        Ok(())
    }
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    registry.register("RandomNumberGenerator", |definition, connector| {
        let ctx = NodeContext::new(definition, connector);
        let seed: u64 = ctx.setting("seed")?;
        Ok(Box::new(RandomNumberGenerator { ctx, state: seed }))
    });
    registry.register("Adder", |definition, connector| {
        Ok(Box::new(Adder {
            ctx: NodeContext::new(definition, connector),
        }))
    });
    registry.register("Squarer", |definition, connector| {
        Ok(Box::new(Squarer {
            ctx: NodeContext::new(definition, connector),
        }))
    });
    registry.register("NumberPrinter", |definition, connector| {
        Ok(Box::new(NumberPrinter {
            ctx: NodeContext::new(definition, connector),
        }))
    });

    registry
}

fn main() {
    simple_log::quick!("info");

    let definition: GraphDefinition = GRAPH_DOCUMENT.parse().expect("graph document is valid");
    let mut graph = Graph::new(&definition, registry()).expect("failed to build graph");

    println!("--- serial ---");
    if let Err(e) = graph.execute(ExecutionMode::Serial) {
        log::error!("serial execution failed: {}", e);
        return;
    }

    let squared: f32 = graph
        .get_output(&Port::new("square", "x2"))
        .expect("square produced a value");
    println!("host read square:x2 = {}", squared);

    println!("--- parallel ---");
    if let Err(e) = graph.execute(ExecutionMode::Parallel) {
        log::error!("parallel execution failed: {}", e);
    }
}
