//! The one protobuf message shape the core must route on. Hand-coded
//! against `prost::Message` rather than generated from a `.proto` file:
//! the core only ever needs to read four fields out of `ResponseEvent`,
//! and generic schema loading for arbitrary message types is out of scope.

/// `warp.multi_agent.v1.ResponseEvent`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseEvent {
    #[prost(oneof = "ResponseEventKind", tags = "1, 2, 3")]
    pub kind: Option<ResponseEventKind>,
}

#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum ResponseEventKind {
    #[prost(message, tag = "1")]
    Init(Init),
    #[prost(message, tag = "2")]
    ClientActions(ClientActions),
    #[prost(message, tag = "3")]
    Finished(Finished),
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Init {
    #[prost(string, tag = "1")]
    pub conversation_id: String,
    #[prost(string, tag = "2")]
    pub task_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientActions {
    #[prost(message, repeated, tag = "1")]
    pub actions: Vec<ClientAction>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientAction {
    #[prost(oneof = "ClientActionKind", tags = "1, 2, 3, 4")]
    pub kind: Option<ClientActionKind>,
}

#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum ClientActionKind {
    #[prost(message, tag = "1")]
    AppendToMessageContent(AppendToMessageContent),
    #[prost(message, tag = "2")]
    AddMessagesToTask(AddMessagesToTask),
    #[prost(message, tag = "3")]
    ToolCall(ToolCall),
    #[prost(message, tag = "4")]
    ToolResponse(ToolResponse),
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AppendToMessageContent {
    #[prost(message, optional, tag = "1")]
    pub message: Option<AgentMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddMessagesToTask {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<AgentMessage>,
    #[prost(string, tag = "2")]
    pub task_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentMessage {
    #[prost(message, optional, tag = "1")]
    pub agent_output: Option<AgentOutput>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentOutput {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolCall {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToolResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Finished {}
