use sortie_model::branch::{BranchContext, GuardedBranch, IdleBranch};
use sortie_model::command::{Command, Parameter, ParameterDomain};
use sortie_model::error::ModelError;
use sortie_model::mission::Mission;
use sortie_model::state::{Configuration, Environment, State};
use sortie_model::system::{CommandSchema, SystemModel};
use sortie_model::value::Value;
use sortie_model::variable::{StateSchema, Variable};

use rand::SeedableRng;

fn takeoff_schema() -> CommandSchema {
    CommandSchema::builder("takeoff")
        .parameter(Parameter::new(
            "altitude",
            ParameterDomain::Float { min: 1.0, max: 50.0 },
        ))
        .branch(GuardedBranch::new(
            "normal",
            |ctx| ctx.state.get_bool("armed") == Some(true),
            |ctx, after| {
                let target = ctx.command.get_f64("altitude").unwrap_or(0.0);
                (after.get_f64("altitude").unwrap_or(0.0) - target).abs() < 0.5
            },
            |ctx| {
                let per_metre = ctx.configuration.get_f64_or("time_per_metre", 1.0);
                ctx.command.get_f64("altitude").unwrap_or(0.0) * per_metre + 2.0
            },
        ))
        .idle(IdleBranch::new(1.0))
        .build()
        .unwrap()
}

fn copter() -> SystemModel {
    let state = StateSchema::new(vec![
        Variable::categorical("armed"),
        Variable::continuous("altitude"),
    ])
    .unwrap();
    SystemModel::new("copter", state, vec![takeoff_schema()]).unwrap()
}

#[test]
fn test_resolve_picks_first_matching_branch() {
    let model = copter();
    let cmd = Command::new("takeoff").with("altitude", 10.0);
    let state = State::from_pairs([("armed", Value::Bool(true)), ("altitude", Value::Float(0.0))]);
    let env = Environment::default();
    let config = Configuration::default();
    let ctx = BranchContext {
        command: &cmd,
        state: &state,
        environment: &env,
        configuration: &config,
    };
    let branch = model.resolve(&ctx).unwrap();
    assert_eq!(branch.name(), "normal");
    assert_eq!(model.timeout(branch, &ctx).unwrap(), 12.0);
}

#[test]
fn test_resolve_falls_back_to_idle() {
    let model = copter();
    let cmd = Command::new("takeoff").with("altitude", 10.0);
    let state = State::from_pairs([("armed", Value::Bool(false)), ("altitude", Value::Float(0.0))]);
    let env = Environment::default();
    let config = Configuration::default();
    let ctx = BranchContext {
        command: &cmd,
        state: &state,
        environment: &env,
        configuration: &config,
    };
    let branch = model.resolve(&ctx).unwrap();
    assert!(branch.is_idle());
}

#[test]
fn test_resolution_is_total_over_states() {
    let model = copter();
    let env = Environment::default();
    let config = Configuration::default();
    let cmd = Command::new("takeoff").with("altitude", 5.0);
    for armed in [true, false] {
        for altitude in [0.0, 2.5, 100.0] {
            let state = State::from_pairs([
                ("armed", Value::Bool(armed)),
                ("altitude", Value::Float(altitude)),
            ]);
            let ctx = BranchContext {
                command: &cmd,
                state: &state,
                environment: &env,
                configuration: &config,
            };
            let matching = model
                .schema("takeoff")
                .unwrap()
                .branches()
                .iter()
                .position(|b| b.precondition(&ctx));
            assert!(matching.is_some());
            assert!(model.resolve(&ctx).is_ok());
        }
    }
}

#[test]
fn test_schema_without_idle_is_rejected() {
    let result = CommandSchema::builder("land").build();
    assert_eq!(
        result.unwrap_err(),
        ModelError::MissingIdleBranch {
            schema: "land".into()
        }
    );
}

#[test]
fn test_empty_parameter_domains_are_rejected() {
    let domains = [
        ParameterDomain::Int { min: 5, max: 3 },
        ParameterDomain::Float { min: 0.0, max: f64::NAN },
        ParameterDomain::Float { min: f64::NEG_INFINITY, max: 0.0 },
        ParameterDomain::Choice { values: vec![] },
    ];
    for domain in domains {
        let result = CommandSchema::builder("goto")
            .parameter(Parameter::new("speed", ParameterDomain::Bool))
            .parameter(Parameter::new("heading", domain))
            .idle(IdleBranch::default())
            .build();
        assert_eq!(
            result.unwrap_err(),
            ModelError::InvalidDomain {
                schema: "goto".into(),
                parameter: "heading".into(),
            }
        );
    }
}

#[test]
fn test_degenerate_domains_are_accepted() {
    let schema = CommandSchema::builder("hover")
        .parameter(Parameter::new("altitude", ParameterDomain::Float { min: 3.0, max: 3.0 }))
        .parameter(Parameter::new("slot", ParameterDomain::Int { min: 2, max: 2 }))
        .parameter(Parameter::new(
            "mode",
            ParameterDomain::Choice {
                values: vec![Value::from("GUIDED")],
            },
        ))
        .idle(IdleBranch::default())
        .build()
        .unwrap();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
    let cmd = schema.generate(&mut rng);
    assert_eq!(cmd.get_f64("altitude"), Some(3.0));
    assert_eq!(cmd.get("slot"), Some(&Value::Int(2)));
    assert_eq!(cmd.get("mode"), Some(&Value::from("GUIDED")));
}

#[test]
fn test_unknown_command_is_model_error() {
    let model = copter();
    let cmd = Command::new("backflip");
    let state = State::default();
    let env = Environment::default();
    let config = Configuration::default();
    let ctx = BranchContext {
        command: &cmd,
        state: &state,
        environment: &env,
        configuration: &config,
    };
    assert!(matches!(
        model.resolve(&ctx),
        Err(ModelError::UnknownCommand { .. })
    ));
}

#[test]
fn test_negative_timeout_is_model_error() {
    let schema = CommandSchema::builder("warp")
        .branch(GuardedBranch::new("normal", |_| true, |_, _| true, |_| -1.0))
        .idle(IdleBranch::default())
        .build()
        .unwrap();
    let model = SystemModel::new("broken", StateSchema::default(), vec![schema]).unwrap();
    let cmd = Command::new("warp");
    let state = State::default();
    let env = Environment::default();
    let config = Configuration::default();
    let ctx = BranchContext {
        command: &cmd,
        state: &state,
        environment: &env,
        configuration: &config,
    };
    let branch = model.resolve(&ctx).unwrap();
    assert!(matches!(
        model.timeout(branch, &ctx),
        Err(ModelError::InvalidTimeout { .. })
    ));
}

#[test]
fn test_duplicate_schema_rejected() {
    let result = SystemModel::new(
        "copter",
        StateSchema::default(),
        vec![takeoff_schema(), takeoff_schema()],
    );
    assert!(matches!(result, Err(ModelError::DuplicateSchema { .. })));
}

#[test]
fn test_default_generator_respects_domains() {
    let schema = takeoff_schema();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
    for _ in 0..20 {
        let cmd = schema.generate(&mut rng);
        assert_eq!(cmd.kind, "takeoff");
        let altitude = cmd.get_f64("altitude").unwrap();
        assert!((1.0..50.0).contains(&altitude));
    }
}

#[test]
fn test_extended_leaves_original_untouched() {
    let root = Mission::empty(
        Configuration::default(),
        Environment::default(),
        State::default(),
    );
    let child = root.extended(Command::new("arm"));
    let grandchild = child.extended(Command::new("takeoff").with("altitude", 5.0));

    assert!(root.is_empty());
    assert_eq!(child.len(), 1);
    assert_eq!(grandchild.len(), 2);
    assert!(grandchild.starts_with(&child));
    assert!(grandchild.starts_with(&root));
    assert!(!child.starts_with(&grandchild));
    assert_ne!(child, grandchild);
}

#[test]
fn test_mission_json_keys() {
    let mission = Mission::empty(
        Configuration::from_pairs([("time_per_metre", 1.5)]),
        Environment::default(),
        State::from_pairs([("altitude", 0.0)]),
    )
    .extended(Command::new("arm"));
    let json = serde_json::to_value(&mission).unwrap();
    for key in ["configuration", "environment", "initial_state", "commands"] {
        assert!(json.get(key).is_some(), "missing key {key}");
    }
    let back: Mission = serde_json::from_value(json).unwrap();
    assert_eq!(back, mission);
}
