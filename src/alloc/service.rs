//! # Service allocator: virtual endpoint derivation.
//!
//! Derives each service's [`Endpoint`] from its spec. Port configurations are
//! copied; virtual IP assignment belongs to pluggable drivers and is out of
//! scope for the built-in allocator, so `virtual_ips` stays empty. A spec with
//! no endpoint configuration yields an empty, already-satisfied endpoint.

use crate::objects::{Endpoint, Service};

/// Assigns virtual endpoints to services.
#[derive(Debug, Default)]
pub struct ServiceAllocator;

impl ServiceAllocator {
    /// Creates a service allocator.
    pub fn new() -> Self {
        Self
    }

    /// Allocates the service in place. Returns whether the object changed.
    ///
    /// Idempotent: a service whose endpoint already equals what its spec
    /// requires is untouched. The endpoint stays stable until the spec
    /// changes, at which point the next event re-derives it.
    pub fn allocate(&mut self, service: &mut Service) -> bool {
        let derived = Endpoint::derive(&service.spec);
        if service.endpoint.as_ref() == Some(&derived) {
            return false;
        }
        service.endpoint = Some(derived);
        true
    }

    /// Releases resources held for the service's endpoint.
    ///
    /// The built-in allocator reserves no VIPs, so there is nothing to return
    /// to any pool; tasks that copied the endpoint keep their copies (the
    /// copies are data, not references).
    pub fn deallocate(&mut self, service: &Service) {
        debug_assert!(service
            .endpoint
            .as_ref()
            .map_or(true, |ep| ep.virtual_ips.is_empty()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{EndpointSpec, PortConfig, Protocol, ServiceSpec};

    #[test]
    fn test_empty_spec_yields_empty_endpoint() {
        let mut alloc = ServiceAllocator::new();
        let mut svc = Service::new("s1", ServiceSpec::default());

        assert!(alloc.allocate(&mut svc));
        assert_eq!(svc.endpoint, Some(Endpoint::default()));
        assert!(svc.is_allocated());
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let mut alloc = ServiceAllocator::new();
        let mut svc = Service::new(
            "s1",
            ServiceSpec {
                name: "web".into(),
                endpoint: Some(EndpointSpec {
                    ports: vec![PortConfig {
                        name: "http".into(),
                        protocol: Protocol::Tcp,
                        target_port: 80,
                        published_port: 8080,
                    }],
                }),
            },
        );

        assert!(alloc.allocate(&mut svc));
        assert!(!alloc.allocate(&mut svc));
        assert_eq!(svc.endpoint.as_ref().unwrap().ports.len(), 1);
    }

    #[test]
    fn test_spec_change_rederives_endpoint() {
        let mut alloc = ServiceAllocator::new();
        let mut svc = Service::new("s1", ServiceSpec::default());
        alloc.allocate(&mut svc);

        svc.spec.endpoint = Some(EndpointSpec {
            ports: vec![PortConfig {
                name: "dns".into(),
                protocol: Protocol::Udp,
                target_port: 53,
                published_port: 53,
            }],
        });
        assert!(alloc.allocate(&mut svc));
        assert_eq!(svc.endpoint.as_ref().unwrap().ports[0].target_port, 53);
    }
}
