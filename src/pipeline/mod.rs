//! Agent roster and route-specific task construction.

use std::path::Path;
use std::sync::Arc;

use crate::dataset::DataFrame;
use crate::router::Route;
use crate::tools::sandbox::SandboxTool;
use crate::tools::viz::VizTool;
use crate::tools::Tool;

pub mod runner;

/// The fixed sentences the visualization specialist must answer with when
/// its tool fails. Kept as named variants internally; the literal text is
/// only produced at the prompt/response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VizFailure {
    Internal,
    Unprocessable,
}

impl VizFailure {
    pub fn as_sentence(self) -> &'static str {
        match self {
            VizFailure::Internal => {
                "Visualization failed: internal error. Check that the selected columns are \
                 suitable for the requested chart type."
            }
            VizFailure::Unprocessable => {
                "Visualization failed: the request could not be processed. Make sure the columns \
                 are numeric and the chart type is compatible."
            }
        }
    }
}

/// A role-bound reasoning participant. Stateless between requests; the
/// behavioral contract lives entirely in the prompt text.
pub struct Agent {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<Arc<dyn Tool>>,
}

/// One unit of agent work, executed in strict sequence.
pub struct Task {
    pub description: String,
    pub expected_output: String,
    pub agent: usize,
}

/// Ordered task list plus agent roster for one request. Built fresh per
/// request and discarded afterwards.
pub struct Pipeline {
    pub route: Route,
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
}

const ANALYST: usize = 0;
const VISUALIST: usize = 1;
const SYNTHESIZER: usize = 2;

/// Assemble the three-agent roster and the task list for the chosen route.
pub fn build(df: &Arc<DataFrame>, route: Route, output_dir: &Path, question: &str) -> Pipeline {
    let sandbox: Arc<dyn Tool> = Arc::new(SandboxTool::new(Arc::clone(df)));
    let viz: Arc<dyn Tool> = Arc::new(VizTool::new(Arc::clone(df), output_dir.to_path_buf()));
    let sandbox_name = sandbox.name().to_string();
    let viz_name = viz.name().to_string();

    let analyst = Agent {
        role: "Quantitative Data Analyst".into(),
        goal: "Convert user questions into analysis scripts that extract numeric and statistical \
               insights from the dataset bound to 'df'."
            .into(),
        backstory: format!(
            "You are a methodical data scientist specialized in exploratory data analysis. Your \
             only source of truth is the dataset 'df'; you operate on pure logic and ignore any \
             outside knowledge. Your main instrument is the '{sandbox_name}' tool, which runs \
             analysis scripts and reports the value left in 'result'. Write precise scripts that \
             end with the value to report. CRITICAL DIRECTIVE: if the question cannot be answered \
             using the columns available in the dataset, your final answer must be exactly: 'The \
             question cannot be answered with the data provided.' You are strictly an analyst; \
             creating visualizations is outside your scope. When a tool observation reports a \
             failure, rethink the script and try again."
        ),
        tools: vec![Arc::clone(&sandbox)],
    };

    let visualist = Agent {
        role: "Data Visualization Specialist".into(),
        goal: "Produce the requested chart through the visualization tool and return exclusively \
               the path of the resulting image file."
            .into(),
        backstory: format!(
            "You are a visualization specialist with a single function: turning chart requests \
             into precise tool calls. You do NOT interpret data, write summaries, or offer \
             conclusions; your only deliverable is the PNG file path. You use the '{viz_name}' \
             tool, which requires chart_kind, columns and an optional title. ERROR PROTOCOL 1: \
             if the tool call itself fails, your final answer MUST be exactly: '{internal}' \
             ERROR PROTOCOL 2: if the tool observation contains '[FAILURE]', '[INFO]' or 'No \
             valid numeric columns', you MUST abort the task and give exactly this final answer: \
             '{unprocessable}'",
            internal = VizFailure::Internal.as_sentence(),
            unprocessable = VizFailure::Unprocessable.as_sentence(),
        ),
        tools: vec![Arc::clone(&viz)],
    };

    let synthesizer = Agent {
        role: "Data Strategist and Quality Reviewer".into(),
        goal: "Consolidate the analysis results into a cohesive, high-level conclusion that is \
               strictly grounded in the facts."
            .into(),
        backstory: "You are the final reviewer, turning raw findings into actionable insight. \
                    Your responsibilities: validate that the gathered results are coherent with \
                    the original question, discard anything that looks like a hallucination or is \
                    unsupported by the facts, and build a narrative from the earlier task \
                    outputs. NEVER describe a chart or mention file paths in your answer. Do NOT \
                    invent business context (e.g. 'profit', 'customer satisfaction') unless those \
                    terms are explicitly present in the analyzed data."
            .into(),
        tools: Vec::new(),
    };

    let tasks = match route {
        Route::Visualization => vec![Task {
            description: format!(
                "Fulfill the user's visualization request: '{question}'.\n\nDataset context - \
                 available columns: {columns}\n\nOUTPUT DIRECTIVE: provide as final answer ONLY \
                 the path of the PNG file. No additional text is allowed.",
                columns = df.column_names().join(", "),
            ),
            expected_output: "The path to the generated .png image file saved in the output \
                              directory."
                .into(),
            agent: VISUALIST,
        }],
        Route::Analysis => vec![
            Task {
                description: format!(
                    "Analyze the dataset to answer the user's question: '{question}'.\n\nDataset \
                     metadata:\n- Shape: {shape:?}\n- Columns: {columns}\n\nUse the \
                     '{sandbox_name}' tool to write and run a script that extracts the answer. \
                     The result must be an objective, concise text strictly based on the data; \
                     avoid assumptions or anything the dataset cannot prove.",
                    shape = df.shape(),
                    columns = df.column_names().join(", "),
                ),
                expected_output: "A clear, factual textual summary with the relevant statistics \
                                  extracted from the dataset."
                    .into(),
                agent: ANALYST,
            },
            Task {
                description: "Compile the results of the previous tasks into a final, cohesive \
                              answer focused exclusively on the analyzed data. Structure: 1. \
                              summary of the main findings (statistics, patterns, outliers); 2. \
                              direct, objective conclusions such as correlations found or their \
                              absence; 3. suggestions for next analysis steps. Never mention \
                              chart files or attempt to describe images. Tone: clear, \
                              professional, purely analytical."
                    .into(),
                expected_output: "A well-structured final answer, rich in data-driven insight \
                                  and free of business speculation."
                    .into(),
                agent: SYNTHESIZER,
            },
        ],
    };

    Pipeline {
        route,
        agents: vec![analyst, visualist, synthesizer],
        tasks,
    }
}
