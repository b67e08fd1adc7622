//! Question routing: visualization-intent vs. analysis-intent.

/// Which agent pipeline serves the request. Computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Visualization,
    Analysis,
}

// Conjunctive keyword match: an imperative verb AND a chart term must both
// appear. Bilingual on purpose; questions arrive in English or Portuguese.
const IMPERATIVE_TRIGGERS: &[&str] = &[
    "draw", "create", "generate", "plot", "show", "desenhe", "crie", "gere", "plote", "exiba",
];

const CHART_TERMS: &[&str] = &[
    "chart",
    "plot",
    "visualization",
    "visualização",
    "visualizacao",
    "distribution",
    "distribuição",
    "distribuicao",
    "histogram",
    "histograma",
    "boxplot",
    "scatter",
    "dispersão",
    "dispersao",
    "bar",
    "barras",
    "gráfico",
    "grafico",
];

/// Deterministic, case-insensitive substring classifier. Not a learned
/// model; swap this function to change the dispatch policy.
pub fn route(question: &str) -> Route {
    let lower = question.to_lowercase();
    let imperative = IMPERATIVE_TRIGGERS.iter().any(|t| lower.contains(t));
    let chart = CHART_TERMS.iter().any(|t| lower.contains(t));
    if imperative && chart {
        Route::Visualization
    } else {
        Route::Analysis
    }
}
