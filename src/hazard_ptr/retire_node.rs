/// The RetireNode stores a single Pointer to retire as well as the function
/// that should be used to retire the given Piece of Data savely
pub struct RetireNode {
    /// The Data-Pointer that should be retired eventually
    pub(crate) ptr: *mut (),
    /// The Function used to actually retire the Data
    retire_fn: Box<dyn Fn(*mut ())>,
}

impl RetireNode {
    /// Creates a new RetireNode with the given Data
    pub fn new(ptr: *mut (), func: Box<dyn Fn(*mut ())>) -> Self {
        Self {
            ptr,
            retire_fn: func,
        }
    }

    pub fn const_ptr(&self) -> *const () {
        self.ptr as *const ()
    }

    /// Actually performs the retirement of the Data
    ///
    /// # Safety
    /// The Caller needs to garantue that the Pointer stored in this Node can't
    /// be accessed by anyone else anymore and is currently not used.
    /// This Node needs to have exclusive access to the Data, as the stored
    /// Retire function can freely access the Data and will most likely mutate
    /// or free the underlying Data
    pub unsafe fn retire(self) {
        let retire_fn = self.retire_fn;
        retire_fn(self.ptr);
    }
}
