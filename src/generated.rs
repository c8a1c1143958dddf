//! Protocol types and server stubs compiled from `proto/provider.proto`.

tonic::include_proto!("hemmer.provider.v1");
