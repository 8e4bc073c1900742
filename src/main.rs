use anyhow::{Context as _, Result};
use dpo_engine::application::{find_isomorphic, ComponentMatchDb};
use dpo_engine::config::{Config, LabelType};
use dpo_engine::context::Context;
use dpo_engine::graph::serde::GraphDesc;
use dpo_engine::graph::LabelledGraph;
use dpo_engine::logger::{start_logger, Logger};
use dpo_engine::rule::serde::RuleDesc;
use dpo_engine::rule::LabelledRule;
use serde::Deserialize;
use std::rc::Rc;

/// A pool of starting graphs and the rules to expand it with.
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    config: Config,
    #[serde(default = "default_rounds")]
    rounds: usize,
    graphs: Vec<GraphDesc>,
    rules: Vec<RuleDesc>,
}

fn default_rounds() -> usize {
    1
}

const DEMO: &str = r#"
config:
  logLevel: info
rounds: 2
graphs:
  - name: ethane
    vertices:
      - {id: 0, label: C}
      - {id: 1, label: C}
    edges:
      - {source: 0, target: 1, label: "-"}
rules:
  - name: split C-C
    context:
      vertices:
        - {id: 0, label: C}
        - {id: 1, label: C}
    left:
      edges:
        - {source: 0, target: 1, label: "-"}
  - name: bond C C
    context:
      vertices:
        - {id: 0, label: C}
        - {id: 1, label: C}
    right:
      edges:
        - {source: 0, target: 1, label: "-"}
"#;

fn load() -> Result<Scenario> {
    let text = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?,
        None => DEMO.to_string(),
    };
    serde_yaml::from_str(&text).context("parsing scenario")
}

fn main() -> Result<()> {
    let scenario = load()?;
    start_logger(scenario.config.level_filter());
    let settings = scenario.config.label_settings;
    let logger = Logger::new(scenario.config.verbosity);
    let mut context = Context::default();

    let mut graphs = vec![];
    for desc in &scenario.graphs {
        let mut graph = desc.build().with_context(|| format!("building graph {}", desc.name))?;
        if settings.label_type == LabelType::Term {
            graph.parse_terms(&mut context.strings);
        }
        graphs.push(Rc::new(graph));
    }
    let mut rules: Vec<Rc<LabelledRule>> = vec![];
    for desc in &scenario.rules {
        let mut rule = desc.build().with_context(|| format!("building rule {}", desc.name))?;
        if settings.label_type == LabelType::Term {
            rule.parse_terms(&mut context.strings);
        }
        rules.push(Rc::new(rule));
    }

    let mut db = ComponentMatchDb::new(settings);
    // New graphs go first; they form the subset every derivation has to touch.
    let mut fresh: Vec<Rc<LabelledGraph>> = graphs;
    let mut known: Vec<Rc<LabelledGraph>> = vec![];
    for round in 0..scenario.rounds {
        if fresh.is_empty() {
            break;
        }
        log::info!("round {}: {} new graphs, {} known", round, fresh.len(), known.len());
        let num_subset = fresh.len();
        let universe: Vec<Rc<LabelledGraph>> = fresh.iter().chain(known.iter()).cloned().collect();
        let mut found: Vec<Rc<LabelledGraph>> = vec![];
        for rule in &rules {
            if !db.is_valid(rule, num_subset, &universe) {
                log::debug!("rule {} can not fire", rule.name());
                continue;
            }
            let matches = db.get_matches(rule, num_subset, &universe);
            db.compute_derivations(
                rule,
                &matches,
                &logger,
                |_, derivation| {
                    println!("{}", derivation);
                    for product in &derivation.right {
                        let seen = find_isomorphic(product, &universe, settings).is_some()
                            || find_isomorphic(product, &found, settings).is_some();
                        if !seen {
                            found.push(product.clone());
                        }
                    }
                    true
                },
                |_, _| true,
            )
            .with_context(|| format!("applying rule {}", rule.name()))?;
        }
        known = universe;
        fresh = found;
    }
    println!("{} graphs in total", known.len() + fresh.len());
    Ok(())
}
