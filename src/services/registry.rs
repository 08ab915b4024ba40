//! Ability and skill registry.
//!
//! A process-wide catalog of named callables, owned by the runtime value
//! and threaded through constructors — never a module-level global.
//! Abilities have shape `(agent, task) -> result`; skills have shape
//! `(agent) -> ()` plus a schedule. Registering an ability also registers
//! a same-named on-demand skill so every ability is loop-invokable.

use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::models::{Skill, SkillState};
use crate::domain::ports::{LlmClient, SharedAgent, SyndicateError, SyndicateResult};

/// Result of an ability invocation.
pub type AbilityResult = SyndicateResult<Value>;

/// A named callable invoked with the owning agent and a task payload.
pub type AbilityFn = Arc<dyn Fn(SharedAgent, Value) -> BoxFuture<'static, AbilityResult> + Send + Sync>;

/// A skill callable invoked with the owning agent only.
pub type SkillFn = Arc<dyn Fn(SharedAgent) -> BoxFuture<'static, SyndicateResult<()>> + Send + Sync>;

/// Boxes an async closure into an [`AbilityFn`].
pub fn ability<F, Fut>(f: F) -> AbilityFn
where
    F: Fn(SharedAgent, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AbilityResult> + Send + 'static,
{
    Arc::new(move |agent, task| Box::pin(f(agent, task)))
}

/// Boxes an async closure into a [`SkillFn`].
pub fn skill_fn<F, Fut>(f: F) -> SkillFn
where
    F: Fn(SharedAgent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyndicateResult<()>> + Send + 'static,
{
    Arc::new(move |agent| Box::pin(f(agent)))
}

/// A skill entry: its schedule plus the callable the loop invokes.
#[derive(Clone)]
pub struct RegisteredSkill {
    pub skill: Skill,
    pub callable: SkillFn,
}

/// Keyed tables of abilities and skills.
///
/// Registrations are additive and expected at startup. Runtime mutation
/// is tolerated but not synchronized against live loops beyond the
/// table locks themselves.
#[derive(Default)]
pub struct AbilityRegistry {
    abilities: RwLock<HashMap<String, AbilityFn>>,
    skills: RwLock<HashMap<String, RegisteredSkill>>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an ability, and a same-named schedule-0 skill if one is
    /// not already present. The auto-registered skill invokes the
    /// ability with a null task and discards the result.
    pub async fn register_ability(&self, name: impl Into<String>, callable: AbilityFn) {
        let name = name.into();
        self.abilities
            .write()
            .await
            .insert(name.clone(), callable.clone());

        let mut skills = self.skills.write().await;
        if !skills.contains_key(&name) {
            let wrapped = callable;
            skills.insert(
                name.clone(),
                RegisteredSkill {
                    skill: Skill::new(name.clone(), 0),
                    callable: Arc::new(move |agent| {
                        let wrapped = wrapped.clone();
                        Box::pin(async move {
                            wrapped(agent, Value::Null).await.map(|_| ())
                        })
                    }),
                },
            );
        }
        debug!(name = %name, "ability registered");
    }

    /// Registers a scheduled skill.
    pub async fn register_skill(
        &self,
        name: impl Into<String>,
        schedule_secs: u64,
        callable: SkillFn,
    ) {
        let name = name.into();
        self.skills.write().await.insert(
            name.clone(),
            RegisteredSkill {
                skill: Skill::new(name.clone(), schedule_secs),
                callable,
            },
        );
        debug!(name = %name, schedule_secs, "skill registered");
    }

    pub async fn get_ability(&self, name: &str) -> Option<AbilityFn> {
        self.abilities.read().await.get(name).cloned()
    }

    pub async fn get_skill(&self, name: &str) -> Option<RegisteredSkill> {
        self.skills.read().await.get(name).cloned()
    }

    pub async fn ability_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.abilities.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds an agent's skill table from its declared abilities.
    ///
    /// Declared names absent from the skill registry are logged and
    /// dropped rather than failing construction.
    pub async fn resolve_skills(&self, declared: &[String]) -> HashMap<String, SkillState> {
        let skills = self.skills.read().await;
        let mut table = HashMap::new();
        for name in declared {
            match skills.get(name) {
                Some(entry) => {
                    table.insert(name.clone(), SkillState::new(entry.skill.clone()));
                }
                None => {
                    warn!(skill = %name, "declared skill not registered, dropping");
                }
            }
        }
        table
    }
}

/// Registers the built-in abilities: `ping`, `echo`, and `chat`.
pub async fn register_builtins(registry: &AbilityRegistry, llm: Arc<dyn LlmClient>) {
    registry
        .register_ability(
            "ping",
            ability(|agent: SharedAgent, _task| async move {
                let agent = agent.read().await;
                Ok(json!({
                    "msg": "pong",
                    "agent_id": agent.id,
                    "agent_name": agent.name,
                }))
            }),
        )
        .await;

    registry
        .register_ability(
            "echo",
            ability(|_agent, task| async move { Ok(task) }),
        )
        .await;

    let chat_llm = llm;
    registry
        .register_ability(
            "chat",
            ability(move |agent: SharedAgent, task| {
                let llm = chat_llm.clone();
                async move {
                    let prompt = task
                        .get("prompt")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            SyndicateError::InvalidTask("chat requires a `prompt` field".into())
                        })?
                        .to_string();
                    let model = { agent.read().await.config.llm.model.clone() };
                    let reply = llm.complete(&prompt, model.as_deref()).await?;
                    Ok(json!({ "reply": reply }))
                }
            }),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Agent, AgentConfig, AgentKind};
    use crate::domain::ports::NullLlmClient;
    use tokio::sync::RwLock as TokioRwLock;

    fn shared_agent() -> SharedAgent {
        let config = AgentConfig::new("tester", AgentKind::Custom);
        Arc::new(TokioRwLock::new(Agent::new(config, HashMap::new())))
    }

    #[tokio::test]
    async fn register_ability_also_registers_skill() {
        let registry = AbilityRegistry::new();
        registry
            .register_ability("noop", ability(|_, _| async { Ok(Value::Null) }))
            .await;

        let skill = registry.get_skill("noop").await.expect("skill");
        assert_eq!(skill.skill.schedule_secs, 0);
        assert!(registry.get_ability("noop").await.is_some());
    }

    #[tokio::test]
    async fn explicit_skill_is_not_clobbered_by_ability() {
        let registry = AbilityRegistry::new();
        registry
            .register_skill("beat", 7, skill_fn(|_| async { Ok(()) }))
            .await;
        registry
            .register_ability("beat", ability(|_, _| async { Ok(Value::Null) }))
            .await;

        let skill = registry.get_skill("beat").await.expect("skill");
        assert_eq!(skill.skill.schedule_secs, 7);
    }

    #[tokio::test]
    async fn resolve_skills_drops_unknown_names() {
        let registry = AbilityRegistry::new();
        registry
            .register_ability("known", ability(|_, _| async { Ok(Value::Null) }))
            .await;

        let table = registry
            .resolve_skills(&["known".to_string(), "ghost".to_string()])
            .await;
        assert_eq!(table.len(), 1);
        assert!(table.contains_key("known"));
    }

    #[tokio::test]
    async fn builtin_ping_reports_identity() {
        let registry = AbilityRegistry::new();
        register_builtins(&registry, Arc::new(NullLlmClient)).await;

        let agent = shared_agent();
        let expected_id = agent.read().await.id.clone();

        let ping = registry.get_ability("ping").await.expect("ping");
        let result = ping(agent, Value::Null).await.unwrap();
        assert_eq!(result["msg"], json!("pong"));
        assert_eq!(result["agent_id"], json!(expected_id));
        assert_eq!(result["agent_name"], json!("tester"));
    }

    #[tokio::test]
    async fn builtin_chat_degrades_without_provider() {
        let registry = AbilityRegistry::new();
        register_builtins(&registry, Arc::new(NullLlmClient)).await;

        let chat = registry.get_ability("chat").await.expect("chat");
        let err = chat(shared_agent(), json!({ "prompt": "hi" }))
            .await
            .unwrap_err();
        assert!(matches!(err, SyndicateError::DependencyMissing(_)));
    }

    #[tokio::test]
    async fn builtin_chat_rejects_missing_prompt() {
        let registry = AbilityRegistry::new();
        register_builtins(&registry, Arc::new(NullLlmClient)).await;

        let chat = registry.get_ability("chat").await.expect("chat");
        let err = chat(shared_agent(), json!({})).await.unwrap_err();
        assert!(matches!(err, SyndicateError::InvalidTask(_)));
    }
}
