//! Startup: turning registrations into a built application.

use std::collections::HashMap;
use std::sync::RwLock;

use sidus_types::config::PlanWeights;
use sidus_types::error::ConfigError;
use sidus_types::ty::TypeKey;

use super::{CompiledTask, Context, LoopRegistration, SkillSource};
use crate::inject::{Component, Executable, Key, ParamKind, TypedRegistry};
use crate::plan::SkillPlan;
use crate::runtime::ExceptionRoute;

/// Everything startup produces.
pub(crate) struct Assembly {
    pub(crate) components: TypedRegistry<Component>,
    pub(crate) skills: HashMap<String, Executable>,
    pub(crate) tasks: TypedRegistry<CompiledTask>,
    pub(crate) loops: Vec<(String, Executable, std::time::Duration)>,
    pub(crate) routes: Vec<ExceptionRoute>,
}

impl Context {
    /// Run every startup step against `components`, which may already hold
    /// pre-registered components.
    ///
    /// The context itself is left untouched, so a failed build can be
    /// inspected or fixed and retried.
    pub(crate) fn build(
        &self,
        mut components: TypedRegistry<Component>,
        weights: PlanWeights,
    ) -> Result<Assembly, ConfigError> {
        self.build_components(&mut components)?;
        run_handlers("configuration", &self.configurations, &components)?;
        run_handlers("post-processor", &self.post_processors, &components)?;
        let skills = self.materialize_skills(&components)?;
        validate_skills(&skills)?;
        let tasks = self.compile_tasks(weights)?;

        let mut loops: Vec<&LoopRegistration> = self.loops.iter().collect();
        loops.sort_by_key(|l| l.executable.order());
        let loops = loops
            .into_iter()
            .enumerate()
            .map(|(i, l)| {
                let name = l
                    .executable
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("loop_{i}"));
                (name, l.executable.clone(), l.interval)
            })
            .collect();

        let mut routes = self.routes.clone();
        routes.sort_by_key(|r| r.order());

        tracing::info!(
            components = components.len(),
            skills = skills.len(),
            tasks = tasks.len(),
            "context built"
        );
        Ok(Assembly {
            components,
            skills: skills.into_iter().collect(),
            tasks,
            loops,
            routes,
        })
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    fn build_components(&self, components: &mut TypedRegistry<Component>) -> Result<(), ConfigError> {
        for (_, ty, _) in self.builders.iter() {
            if components.contains(ty) {
                continue;
            }
            let mut visiting = Vec::new();
            self.build_component(components, ty, &mut visiting)?;
        }
        Ok(())
    }

    /// Build the component answering to `ty` after its dependencies.
    ///
    /// `visiting` holds the chain of builders currently being resolved and
    /// turns a dependency cycle into an error.
    fn build_component(
        &self,
        components: &mut TypedRegistry<Component>,
        ty: TypeKey,
        visiting: &mut Vec<(String, TypeKey)>,
    ) -> Result<(), ConfigError> {
        let (name, exact, builder) = self
            .builders
            .get_entry(Key::Type(ty))?
            .ok_or_else(|| ConfigError::MissingBuilder(ty.short_name().to_string()))?;
        if components.contains(exact) {
            return Ok(());
        }
        if visiting.iter().any(|(_, t)| *t == exact) {
            let chain: Vec<&str> = visiting
                .iter()
                .map(|(n, _)| n.as_str())
                .chain(std::iter::once(name))
                .collect();
            return Err(ConfigError::DependencyCycle(chain.join(" -> ")));
        }

        visiting.push((name.to_string(), exact));
        for param in builder.params() {
            if param.kind != ParamKind::Component {
                continue;
            }
            // Resolve against the builders, not the components built so far,
            // so two providers of one view are ambiguous in any order.
            if self.builders.get_entry(Key::Type(param.ty))?.is_some() {
                self.build_component(components, param.ty, visiting)?;
            }
        }
        visiting.pop();

        let component = builder
            .invoke(components, None)
            .and_then(|value| builder.into_component(value))
            .map_err(|err| ConfigError::ComponentFailed {
                component: name.to_string(),
                reason: format!("{err:#}"),
            })?;
        components.put(component, name, Some(exact))?;
        tracing::debug!(component = %name, "component built");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Skills
    // -----------------------------------------------------------------------

    fn materialize_skills(
        &self,
        components: &TypedRegistry<Component>,
    ) -> Result<Vec<(String, Executable)>, ConfigError> {
        let mut skills = Vec::with_capacity(self.skills.len());
        for (name, source) in &self.skills {
            let executable = match source {
                SkillSource::Function(executable) => executable.clone(),
                SkillSource::Stateful { constructor, bind } => {
                    let value = constructor.invoke(components, None).map_err(|err| {
                        ConfigError::InvalidSkill {
                            skill: name.clone(),
                            reason: format!("{err:#}"),
                        }
                    })?;
                    bind(value).ok_or_else(|| ConfigError::InvalidSkill {
                        skill: name.clone(),
                        reason: "constructor produced an unexpected type".to_string(),
                    })?
                }
            };
            skills.push((name.clone(), executable.named(name.clone())));
        }
        Ok(skills)
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    fn compile_tasks(&self, weights: PlanWeights) -> Result<TypedRegistry<CompiledTask>, ConfigError> {
        let all_skills = self.skill_names();
        let mut tasks = TypedRegistry::new();
        for (name, ty, registration) in self.tasks.iter() {
            let plan = SkillPlan::compile(&all_skills, &registration.descriptor.skills, weights)?;
            tracing::debug!(task = %name, depth = plan.depth(), "skill plan compiled");
            let compiled = CompiledTask {
                descriptor: registration.descriptor.clone(),
                constructor: registration.constructor.clone(),
                instantiate: registration.instantiate,
                plan: RwLock::new(plan),
            };
            tasks.put(compiled, name, Some(ty))?;
        }
        Ok(tasks)
    }
}

fn run_handlers(
    stage: &'static str,
    handlers: &[Executable],
    components: &TypedRegistry<Component>,
) -> Result<(), ConfigError> {
    let mut ordered: Vec<&Executable> = handlers.iter().collect();
    ordered.sort_by_key(|h| h.order());
    for handler in ordered {
        handler
            .invoke(components, None)
            .map_err(|err| ConfigError::HandlerFailed {
                stage,
                handler: handler.display_name().to_string(),
                reason: format!("{err:#}"),
            })?;
        tracing::debug!(stage, handler = handler.display_name(), "startup handler applied");
    }
    Ok(())
}

/// Every skill must produce a value and take exactly one value parameter.
fn validate_skills(skills: &[(String, Executable)]) -> Result<(), ConfigError> {
    for (name, skill) in skills {
        if skill.produces().is_none() {
            return Err(ConfigError::InvalidSkill {
                skill: name.clone(),
                reason: "no produced type declared".to_string(),
            });
        }
        let values = skill
            .params()
            .iter()
            .filter(|p| p.kind == ParamKind::Value)
            .count();
        if values != 1 {
            return Err(ConfigError::InvalidSkill {
                skill: name.clone(),
                reason: format!("expected exactly one value parameter, found {values}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use sidus_types::error::RegistryError;

    use super::*;
    use crate::error::ExecError;
    use crate::inject::Secondary;

    struct Config {
        base: i64,
    }

    struct Math {
        config: Arc<Config>,
    }

    struct Reporter {
        math: Arc<Math>,
    }

    fn config_builder() -> Executable {
        Executable::constructor::<Config>().build(|_| Ok(Config { base: 10 }))
    }

    fn math_builder() -> Executable {
        Executable::constructor::<Math>()
            .component::<Config>("config")
            .build(|args| {
                Ok(Math {
                    config: args.component("config")?,
                })
            })
    }

    fn reporter_builder() -> Executable {
        Executable::constructor::<Reporter>()
            .component::<Math>("math")
            .build(|args| {
                Ok(Reporter {
                    math: args.component("math")?,
                })
            })
    }

    fn build(ctx: &Context) -> Result<Assembly, ConfigError> {
        ctx.build(TypedRegistry::new(), PlanWeights::default())
    }

    #[test]
    fn test_dependencies_built_first_regardless_of_order() {
        let mut ctx = Context::new();
        ctx.add_component_builder(reporter_builder()).unwrap();
        ctx.add_component_builder(math_builder()).unwrap();
        ctx.add_component_builder(config_builder()).unwrap();

        let assembly = build(&ctx).unwrap();
        assert_eq!(assembly.components.len(), 3);
        let reporter = assembly
            .components
            .get(Key::of::<Reporter>())
            .unwrap()
            .unwrap()
            .get::<Reporter>()
            .unwrap();
        assert_eq!(reporter.math.config.base, 10);

        // Built once: the reporter's math is the registered math.
        let math = assembly.components.get("math").unwrap().unwrap().get::<Math>().unwrap();
        assert!(Arc::ptr_eq(&math, &reporter.math));
    }

    #[test]
    fn test_missing_builder() {
        let mut ctx = Context::new();
        ctx.add_component_builder(math_builder()).unwrap();
        let err = build(&ctx).err().unwrap();
        assert!(matches!(err, ConfigError::MissingBuilder(ty) if ty == "Config"));
    }

    #[test]
    fn test_dependency_cycle() {
        struct Ping;
        struct Pong;
        let mut ctx = Context::new();
        ctx.add_component_builder(
            Executable::constructor::<Ping>()
                .component::<Pong>("pong")
                .build(|_| Ok(Ping)),
        )
        .unwrap();
        ctx.add_component_builder(
            Executable::constructor::<Pong>()
                .component::<Ping>("ping")
                .build(|_| Ok(Pong)),
        )
        .unwrap();

        let err = build(&ctx).err().unwrap();
        match err {
            ConfigError::DependencyCycle(chain) => assert_eq!(chain, "ping -> pong -> ping"),
            other => panic!("unexpected error: {other}"),
        }
    }

    trait Notifier: Send + Sync {
        fn channel(&self) -> &'static str;
    }

    struct MailNotifier;
    struct SmsNotifier;

    impl Notifier for MailNotifier {
        fn channel(&self) -> &'static str {
            "mail"
        }
    }

    impl Notifier for SmsNotifier {
        fn channel(&self) -> &'static str {
            "sms"
        }
    }

    struct Alerts {
        notifier: Arc<dyn Notifier>,
    }

    fn mail_builder() -> Executable {
        Executable::constructor::<MailNotifier>()
            .provides::<dyn Notifier>(|m| m)
            .build(|_| Ok(MailNotifier))
    }

    fn sms_builder() -> Executable {
        Executable::constructor::<SmsNotifier>()
            .provides::<dyn Notifier>(|s| s)
            .build(|_| Ok(SmsNotifier))
    }

    fn alerts_builder() -> Executable {
        Executable::constructor::<Alerts>()
            .component::<dyn Notifier>("notifier")
            .build(|args| {
                Ok(Alerts {
                    notifier: args.component("notifier")?,
                })
            })
    }

    #[test]
    fn test_view_dependency_resolves_single_provider() {
        let mut ctx = Context::new();
        ctx.add_component_builder(alerts_builder()).unwrap();
        ctx.add_component_builder(sms_builder()).unwrap();

        let assembly = build(&ctx).unwrap();
        let alerts = assembly
            .components
            .get(Key::of::<Alerts>())
            .unwrap()
            .unwrap()
            .get::<Alerts>()
            .unwrap();
        assert_eq!(alerts.notifier.channel(), "sms");
    }

    #[test]
    fn test_ambiguous_view_dependency_fails_in_any_order() {
        let orders: [[fn() -> Executable; 3]; 3] = [
            [mail_builder, sms_builder, alerts_builder],
            [mail_builder, alerts_builder, sms_builder],
            [alerts_builder, mail_builder, sms_builder],
        ];
        for order in orders {
            let mut ctx = Context::new();
            for builder in order {
                ctx.add_component_builder(builder()).unwrap();
            }
            let err = build(&ctx).err().unwrap();
            match err {
                ConfigError::Registry(RegistryError::Ambiguous { candidates, .. }) => {
                    assert_eq!(candidates.len(), 2);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_builder_failure_aborts() {
        #[derive(Debug, thiserror::Error)]
        #[error("no credentials")]
        struct NoCredentials;

        let mut ctx = Context::new();
        ctx.add_component_builder(
            Executable::constructor::<Config>().build(|_| Err(NoCredentials.into())),
        )
        .unwrap();
        let err = build(&ctx).err().unwrap();
        assert!(err.to_string().contains("no credentials"));
    }

    #[test]
    fn test_handlers_run_in_ascending_order_after_components() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = Context::new();
        ctx.add_component_builder(config_builder()).unwrap();

        for (label, order) in [("late", 5), ("early", -1), ("tied_first", 0), ("tied_second", 0)] {
            let calls = Arc::clone(&calls);
            ctx.add_configuration(
                Executable::function()
                    .named(label)
                    .component::<Config>("config")
                    .build(move |args| {
                        let config = args.component::<Config>("config")?;
                        calls.lock().unwrap().push(format!("{label}:{}", config.base));
                        Ok(())
                    }),
                order,
            );
        }
        let post = Arc::clone(&calls);
        ctx.add_post_processor(
            Executable::function().named("post").build(move |_| {
                post.lock().unwrap().push("post".to_string());
                Ok(())
            }),
            -100,
        );

        build(&ctx).unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["early:10", "tied_first:10", "tied_second:10", "late:10", "post"]
        );
    }

    #[test]
    fn test_handler_failure_names_stage() {
        #[derive(Debug, thiserror::Error)]
        #[error("bad key")]
        struct BadKey;

        let mut ctx = Context::new();
        ctx.add_post_processor(
            Executable::function().named("check_keys").build(|_| Err(BadKey.into())),
            0,
        );
        let err = build(&ctx).err().unwrap();
        assert_eq!(err.to_string(), "post-processor 'check_keys' failed: bad key");
    }

    #[test]
    fn test_skill_validation() {
        let mut ctx = Context::new();
        ctx.add_skill(
            Executable::function()
                .named("no_output")
                .value::<i64>("value")
                .build(|_| Ok(())),
        )
        .unwrap();
        let err = build(&ctx).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidSkill { skill, .. } if skill == "no_output"));

        let mut ctx = Context::new();
        ctx.add_skill(
            Executable::function()
                .named("two_values")
                .returns::<i64>()
                .value::<i64>("a")
                .value::<i64>("b")
                .build(|_| Ok(0)),
        )
        .unwrap();
        let err = build(&ctx).err().unwrap();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_stateful_skill_materialized_once() {
        struct Counter {
            config: Arc<Config>,
            calls: AtomicUsize,
        }

        let mut ctx = Context::new();
        ctx.add_component_builder(config_builder()).unwrap();
        let name = ctx
            .add_stateful_skill(
                Executable::constructor::<Counter>()
                    .component::<Config>("config")
                    .build(|args| {
                        Ok(Counter {
                            config: args.component("config")?,
                            calls: AtomicUsize::new(0),
                        })
                    }),
                |counter: Arc<Counter>| {
                    Executable::function()
                        .returns::<i64>()
                        .value::<i64>("value")
                        .build(move |args| {
                            let calls = counter.calls.fetch_add(1, Ordering::SeqCst) as i64;
                            Ok(args.take::<i64>("value")? + counter.config.base + calls)
                        })
                },
            )
            .unwrap();
        assert_eq!(name, "counter");

        let assembly = build(&ctx).unwrap();
        let skill = &assembly.skills["counter"];
        assert_eq!(skill.name(), Some("counter"));

        let run = |v: i64| -> Result<i64, ExecError> {
            let out = skill.invoke(&assembly.components, Some(Secondary::new().with("value", v)))?;
            Ok(out.downcast::<i64>().unwrap())
        };
        assert_eq!(run(1).unwrap(), 11);
        assert_eq!(run(1).unwrap(), 12);
    }

    #[test]
    fn test_task_with_unknown_skill_fails_build() {
        use crate::task::Task;

        struct Noop;
        impl Task for Noop {
            type Input = ();
            type Output = ();
            fn forward(&self) -> Result<(), ExecError> {
                Ok(())
            }
            fn on_complete(&self, _: ()) -> Result<(), ExecError> {
                Ok(())
            }
        }

        let mut ctx = Context::new();
        ctx.add_task::<Noop, _, _>(
            Executable::constructor::<Noop>().build(|_| Ok(Noop)),
            None,
            ["missing"],
        )
        .unwrap();
        let err = build(&ctx).err().unwrap();
        assert!(matches!(err, ConfigError::Plan(_)));
    }
}
