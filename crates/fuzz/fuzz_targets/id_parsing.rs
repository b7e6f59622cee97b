#![no_main]
use libfuzzer_sys::fuzz_target;
use permreg_types::{Address, ResourceId, RoleBitmap, TokenId};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(token) = s.parse::<TokenId>() {
        let (canonical, version) = token.decode();
        assert_eq!(canonical.token_id(version), token);
        assert_eq!(token.to_string().parse::<TokenId>().ok(), Some(token));
    }
    if let Ok(resource) = s.parse::<ResourceId>() {
        assert_eq!(resource.canonical_id().resource_id(resource.version()), resource);
    }
    if let Ok(address) = s.parse::<Address>() {
        assert_eq!(address.to_string().parse::<Address>().ok(), Some(address));
    }
    if let Ok(roles) = s.parse::<RoleBitmap>() {
        let _ = roles.is_valid();
        assert_eq!(roles.to_string().parse::<RoleBitmap>().ok(), Some(roles));
    }
});
