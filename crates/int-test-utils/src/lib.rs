#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

mod mock_node;
pub use mock_node::{
    MockNode,
    MockReply,
    RecordedCall,
    defaults,
};

mod fixtures;
pub use fixtures::{
    FIXTURE_CALL_DATA,
    FIXTURE_CONTRACT,
    FIXTURE_GAS,
    block_response,
    fixture_call_result,
    fixture_request,
    signed_authorization,
};
