//! Sequential pipeline execution: one task at a time, tool calls resolved
//! inline, task outputs handed to later tasks as context.

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use super::{Agent, Pipeline, Task};
use crate::llm::{ChatMessage, ChatOptions, LlmClient, ToolSchema};
use crate::tools::{signals_failure, FAILURE_MARKER};

/// Upper bound on assistant turns within one task. The reasoning engine
/// may retry failed tool calls within this budget.
const MAX_TASK_TURNS: usize = 6;

pub struct PipelineRunner {
    client: LlmClient,
    model: String,
    temperature: f32,
}

impl PipelineRunner {
    pub fn new(client: LlmClient, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }

    /// Run every task in order and return the final task's text output.
    pub async fn run(&self, pipeline: &Pipeline) -> Result<String> {
        let mut memory: Vec<String> = Vec::new();
        for (i, task) in pipeline.tasks.iter().enumerate() {
            let agent = &pipeline.agents[task.agent];
            info!(task = i + 1, total = pipeline.tasks.len(), role = %agent.role, "task started");
            let output = self.run_task(agent, task, &memory).await?;
            info!(task = i + 1, chars = output.len(), "task finished");
            memory.push(output);
        }
        memory
            .pop()
            .ok_or_else(|| anyhow::anyhow!("pipeline produced no output"))
    }

    async fn run_task(&self, agent: &Agent, task: &Task, memory: &[String]) -> Result<String> {
        let mut messages = vec![
            ChatMessage::system(format!(
                "You are {role}.\n\nGoal: {goal}\n\n{backstory}",
                role = agent.role,
                goal = agent.goal,
                backstory = agent.backstory,
            )),
            ChatMessage::user(task_prompt(task, memory)),
        ];

        let schemas: Vec<ToolSchema> = agent.tools.iter().map(|t| t.schema()).collect();
        let opts = ChatOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            tools: if schemas.is_empty() {
                None
            } else {
                Some(schemas)
            },
            tool_choice: if agent.tools.is_empty() {
                None
            } else {
                Some("auto".into())
            },
        };

        for _ in 0..MAX_TASK_TURNS {
            let reply = self.client.chat(&messages, &opts).await?;
            if reply.tool_calls.is_empty() {
                return Ok(reply.content);
            }

            messages.push(ChatMessage {
                role: crate::llm::Role::Assistant,
                content: reply.content.clone(),
                name: None,
                tool_call_id: None,
                tool_calls: Some(reply.tool_calls.clone()),
            });
            for call in &reply.tool_calls {
                let name = &call.function.name;
                let args = &call.function.arguments;
                debug!(tool = %name, args = %args, "tool invocation");
                let output = match agent.tools.iter().find(|t| t.name() == name.as_str()) {
                    Some(tool) => tool.invoke(args),
                    None => format!("{FAILURE_MARKER} unknown tool '{name}'"),
                };
                if signals_failure(&output) {
                    warn!(tool = %name, output = %output, "tool reported a failure");
                }
                messages.push(ChatMessage::tool(call.id.clone(), name.clone(), output));
            }
        }

        bail!(
            "agent '{}' exceeded the {MAX_TASK_TURNS}-turn budget without a final answer",
            agent.role
        )
    }
}

fn task_prompt(task: &Task, memory: &[String]) -> String {
    let mut prompt = task.description.clone();
    if !memory.is_empty() {
        prompt.push_str("\n\nContext from earlier tasks:\n");
        for (i, entry) in memory.iter().enumerate() {
            prompt.push_str(&format!("--- task {} output ---\n{entry}\n", i + 1));
        }
    }
    prompt.push_str(&format!("\n\nExpected output: {}", task.expected_output));
    prompt
}
