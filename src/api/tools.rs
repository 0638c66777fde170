//! Discovery catalog describing the query endpoints to automated clients.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ToolField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub method: &'static str,
    pub endpoint: &'static str,
    pub inputs: Vec<ToolField>,
    pub outputs: Vec<ToolField>,
}

const fn field(name: &'static str, kind: &'static str) -> ToolField {
    ToolField { name, kind }
}

pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "execution_status",
            description: "Status and timing of one pipeline execution on one day",
            method: "GET",
            endpoint: "/api/v1/execution-status",
            inputs: vec![
                field("region", "string"),
                field("pipeline", "string"),
                field("day", "date"),
            ],
            outputs: vec![
                field("run_status", "integer"),
                field("status_label", "string"),
                field("duration_minutes", "number"),
                field("log", "string"),
            ],
        },
        ToolDescriptor {
            name: "execution_statistics",
            description: "Duration statistics of a pipeline over an inclusive day range",
            method: "GET",
            endpoint: "/api/v1/execution-statistics",
            inputs: vec![
                field("region", "string"),
                field("pipeline", "string"),
                field("from", "date"),
                field("to", "date"),
            ],
            outputs: vec![
                field("overall", "object"),
                field("by_status", "object"),
            ],
        },
        ToolDescriptor {
            name: "readiness",
            description: "Whether each upstream pipeline finished before the dependent started",
            method: "GET",
            endpoint: "/api/v1/readiness",
            inputs: vec![
                field("region", "string"),
                field("pipeline", "string"),
                field("day", "date"),
                field("upstream", "array"),
            ],
            outputs: vec![field("dependencies", "array")],
        },
    ]
}
