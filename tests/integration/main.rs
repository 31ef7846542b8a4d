mod mock_providers;
mod orchestrator_flow;
